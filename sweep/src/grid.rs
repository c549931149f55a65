//! Fixed-grid benchmark
//!
//! Runs the sequential baseline and a fixed list of parallel levels the same
//! number of times each, in that order.

use crate::collector::SampleCollector;
use crate::error::SweepError;
use crate::workload::Workload;
use serde::{Deserialize, Serialize};
use timing::{Configuration, SampleSet};
use tracing::info;

/// Benchmark grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedGrid {
    pub iters: u32,
    pub parallel_levels: Vec<u32>,
    pub include_baseline: bool,
}

impl FixedGrid {
    pub fn new(iters: u32, parallel_levels: Vec<u32>) -> Self {
        Self {
            iters,
            parallel_levels,
            include_baseline: true,
        }
    }

    /// Configurations in run order: baseline first, then each parallel level
    pub fn configurations(&self) -> Vec<Configuration> {
        let baseline = self.include_baseline.then(Configuration::sequential);
        baseline
            .into_iter()
            .chain(self.parallel_levels.iter().map(|&t| Configuration::parallel(t)))
            .collect()
    }

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.iters == 0 {
            return Err(SweepError::InvalidConfig("iters must be at least 1".to_string()));
        }
        if self.parallel_levels.iter().any(|&t| t == 0) {
            return Err(SweepError::InvalidConfig(
                "thread counts must be positive".to_string(),
            ));
        }
        if self.configurations().is_empty() {
            return Err(SweepError::EmptyResult);
        }
        Ok(())
    }

    /// Run every configuration; the first failing trial aborts the run
    pub fn run<W: Workload>(&self, collector: &mut SampleCollector<W>) -> Result<Vec<SampleSet>, SweepError> {
        self.validate()?;

        let configs = self.configurations();
        let mut sets = Vec::with_capacity(configs.len());
        for (i, config) in configs.into_iter().enumerate() {
            info!(%config, step = i + 1, iters = self.iters, "benchmarking configuration");
            sets.push(collector.collect(config, self.iters)?);
        }
        Ok(sets)
    }
}

impl Default for FixedGrid {
    fn default() -> Self {
        Self::new(10, vec![5, 10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunPaths;
    use crate::error::ExecutionError;
    use std::path::Path;
    use timing::Report;

    /// Time inversely proportional to threads
    struct Scaling {
        calls: Vec<Configuration>,
    }

    impl Workload for Scaling {
        fn invoke(
            &mut self,
            config: &Configuration,
            _dataset: &Path,
            _output: &Path,
        ) -> Result<f64, ExecutionError> {
            self.calls.push(*config);
            Ok(1000.0 / config.threads as f64)
        }
    }

    #[test]
    fn test_default_grid_order() {
        let grid = FixedGrid::default();
        assert_eq!(
            grid.configurations(),
            vec![
                Configuration::sequential(),
                Configuration::parallel(5),
                Configuration::parallel(10)
            ]
        );
    }

    #[test]
    fn test_grid_run_feeds_speedup_report() {
        let mut wl = Scaling { calls: Vec::new() };
        let mut collector = SampleCollector::new(&mut wl, RunPaths::new("in.txt", "out"));
        let sets = FixedGrid::new(2, vec![4]).run(&mut collector).unwrap();
        assert_eq!(sets.len(), 2);

        let report = Report::from_sample_sets(&sets).unwrap().with_speedup().unwrap();
        assert_eq!(report.get(&Configuration::parallel(4)).unwrap().speedup, Some(4.0));
        assert_eq!(report.optimum, Configuration::parallel(4));

        // sequential trials complete before any parallel trial starts
        assert_eq!(
            wl.calls,
            vec![
                Configuration::sequential(),
                Configuration::sequential(),
                Configuration::parallel(4),
                Configuration::parallel(4)
            ]
        );
    }

    #[test]
    fn test_grid_without_baseline_cannot_report_speedup() {
        let mut wl = Scaling { calls: Vec::new() };
        let mut collector = SampleCollector::new(&mut wl, RunPaths::new("in.txt", "out"));
        let grid = FixedGrid {
            include_baseline: false,
            ..FixedGrid::new(1, vec![2, 3])
        };
        let sets = grid.run(&mut collector).unwrap();
        let report = Report::from_sample_sets(&sets).unwrap();
        assert!(report.with_speedup().is_err());
    }

    #[test]
    fn test_empty_grid_rejected() {
        let grid = FixedGrid {
            include_baseline: false,
            ..FixedGrid::new(3, vec![])
        };
        assert!(matches!(grid.validate(), Err(SweepError::EmptyResult)));
        assert!(matches!(
            FixedGrid::new(3, vec![0]).validate(),
            Err(SweepError::InvalidConfig(_))
        ));
    }
}
