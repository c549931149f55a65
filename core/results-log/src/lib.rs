//! Shared Results Log
//!
//! Row-oriented CSV log that the workload appends to after every run.
//! Layout: header `version,threads,ms,timestamp`, one row per run.
//! Columns are matched by name on read, so their order is free.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use thiserror::Error;
use timing::{Configuration, Measurement, VersionLabel};

/// Column names in write order
pub const HEADER: [&str; 4] = ["version", "threads", "ms", "timestamp"];

#[derive(Debug, Error)]
pub enum LogError {
    #[error("results log I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("results log is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("results log row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// One logged run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub version: VersionLabel,
    pub threads: u32,
    pub ms: f64,
    pub timestamp: DateTime<FixedOffset>,
}

impl LogRow {
    pub fn config(&self) -> Configuration {
        Configuration {
            version: self.version,
            threads: self.threads,
        }
    }

    fn validate(&self, row: usize) -> Result<(), LogError> {
        if self.threads == 0 {
            return Err(LogError::InvalidRow {
                row,
                reason: "thread count must be positive".to_string(),
            });
        }
        if !self.ms.is_finite() || self.ms < 0.0 {
            return Err(LogError::InvalidRow {
                row,
                reason: format!("elapsed time must be a non-negative number, got {}", self.ms),
            });
        }
        Ok(())
    }
}

/// Read every row of a log file
pub fn read_log(path: &Path) -> Result<Vec<LogRow>, LogError> {
    let file = fs::File::open(path)?;
    read_from(file)
}

/// Read rows from any CSV source with a header line
pub fn read_from<R: io::Read>(reader: R) -> Result<Vec<LogRow>, LogError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<LogRow>().enumerate() {
        let row = result?;
        row.validate(i + 1)?;
        rows.push(row);
    }
    Ok(rows)
}

/// Append one row, writing the header first if the file is new or empty
pub fn append_row(path: &Path, row: &LogRow) -> Result<(), LogError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        wtr.write_record(HEADER)?;
    }
    wtr.serialize(row)?;
    wtr.flush()?;
    Ok(())
}

/// Remove the log so the next run starts from an empty file
pub fn clear(path: &Path) -> Result<(), LogError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Convert rows into measurements, numbering runs per configuration in timestamp order
pub fn to_measurements(rows: &[LogRow]) -> Vec<Measurement> {
    let mut ordered: Vec<&LogRow> = rows.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut counters: HashMap<Configuration, u32> = HashMap::new();
    ordered
        .into_iter()
        .map(|r| {
            let idx = counters.entry(r.config()).or_insert(0);
            *idx += 1;
            Measurement::at(r.config(), *idx, r.ms, r.timestamp.into())
        })
        .collect()
}
