//! Artifacts for the external chart renderer

use crate::error::SweepError;
use serde::Serialize;
use std::fs;
use std::path::Path;
use timing::SampleSet;

/// One row of `threads_sweep.csv`
#[derive(Debug, Serialize)]
struct RecordRow {
    version: timing::VersionLabel,
    threads: u32,
    run_idx: u32,
    ms: f64,
}

/// Write raw records as CSV (`version,threads,run_idx,ms`)
pub fn write_records_csv(path: &Path, sets: &[SampleSet]) -> Result<(), SweepError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for m in sets.iter().flat_map(|s| s.measurements()) {
        wtr.serialize(RecordRow {
            version: m.config.version,
            threads: m.config.threads,
            run_idx: m.run_idx,
            ms: m.ms,
        })?;
    }
    wtr.flush()
        .map_err(|e| SweepError::io(e, format!("flushing {}", path.display())))?;
    Ok(())
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SweepError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| SweepError::io(e, format!("writing {}", path.display())))
}
