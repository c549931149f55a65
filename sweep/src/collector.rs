//! Sample Collector
//!
//! Runs the workload a fixed number of times for one configuration,
//! strictly one after another.

use crate::config::RunPaths;
use crate::error::SweepError;
use crate::workload::Workload;
use timing::{Configuration, SampleSet};
use tracing::info;

pub struct SampleCollector<W: Workload> {
    workload: W,
    paths: RunPaths,
}

impl<W: Workload> SampleCollector<W> {
    pub fn new(workload: W, paths: RunPaths) -> Self {
        Self { workload, paths }
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Collect `trials` measurements for `config`.
    ///
    /// The first failing trial aborts the whole set; nothing partial is returned.
    pub fn collect(&mut self, config: Configuration, trials: u32) -> Result<SampleSet, SweepError> {
        if trials == 0 {
            return Err(SweepError::InvalidConfig(
                "trial count must be at least 1".to_string(),
            ));
        }

        let output = self.paths.output_for(&config);
        let mut set = SampleSet::new(config);

        for trial in 1..=trials {
            let ms = self
                .workload
                .invoke(&config, &self.paths.dataset, &output)
                .map_err(|source| SweepError::Trial {
                    config,
                    trial,
                    source,
                })?;
            set.record(ms);
            info!(%config, trial, trials, ms, "trial complete");
        }

        info!(
            %config,
            mean_ms = set.mean_ms(),
            std_ms = set.std_ms(),
            "sample set complete"
        );
        Ok(set)
    }
}
