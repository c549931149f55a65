//! Sweep configuration
//!
//! Resolved once at startup and passed by value into the controller.

use crate::error::SweepError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use timing::{Configuration, VersionLabel};

/// Upper concurrency bound: twice the logical cores, at least 2
pub fn default_tmax() -> u32 {
    (num_cpus::get() as u32).saturating_mul(2).max(2)
}

/// How a strict improvement interacts with the patience counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StopRule {
    /// A new best resets the counter only if its relative gain reaches `min_gain`
    #[default]
    MinGain,
    /// Any new best resets the counter
    Literal,
}

/// Parameters of one adaptive sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub iters: u32,       // trials per level
    pub tmin: u32,
    pub tmax: u32,
    pub patience: u32,    // consecutive non-improving levels tolerated
    pub min_gain: f64,    // relative gain that still counts as progress
    pub epsilon: f64,     // tolerance for the strict-improvement test
    #[serde(default)]
    pub rule: StopRule,
}

impl SweepConfig {
    pub const DEFAULT_ITERS: u32 = 10;
    pub const DEFAULT_PATIENCE: u32 = 2;
    pub const DEFAULT_MIN_GAIN: f64 = 0.02;
    pub const DEFAULT_EPSILON: f64 = 1e-9;

    pub fn validate(&self) -> Result<(), SweepError> {
        if self.iters == 0 {
            return Err(SweepError::InvalidConfig("iters must be at least 1".to_string()));
        }
        if self.tmin == 0 {
            return Err(SweepError::InvalidConfig("tmin must be at least 1".to_string()));
        }
        if self.tmax < self.tmin {
            return Err(SweepError::InvalidConfig(format!(
                "tmax ({}) must not be below tmin ({})",
                self.tmax, self.tmin
            )));
        }
        if !(0.0..1.0).contains(&self.min_gain) {
            return Err(SweepError::InvalidConfig(format!(
                "min_gain must lie in [0, 1), got {}",
                self.min_gain
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SweepError::InvalidConfig(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Candidate concurrency levels in visiting order
    pub fn levels(&self) -> RangeInclusive<u32> {
        self.tmin..=self.tmax
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            iters: Self::DEFAULT_ITERS,
            tmin: 1,
            tmax: default_tmax(),
            patience: Self::DEFAULT_PATIENCE,
            min_gain: Self::DEFAULT_MIN_GAIN,
            epsilon: Self::DEFAULT_EPSILON,
            rule: StopRule::default(),
        }
    }
}

/// Filesystem locations shared by every invocation of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub dataset: PathBuf,
    pub out_dir: PathBuf,
}

impl RunPaths {
    pub fn new(dataset: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Fail before any measurement if the dataset is missing
    pub fn check_inputs(&self) -> Result<(), SweepError> {
        require_exists(&self.dataset)
    }

    pub fn ensure_dirs(&self) -> Result<(), SweepError> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| SweepError::io(e, format!("creating {}", self.out_dir.display())))
    }

    /// Output artifact the workload writes for a configuration
    pub fn output_for(&self, config: &Configuration) -> PathBuf {
        let name = match config.version {
            VersionLabel::Sequential => "output_seq.txt".to_string(),
            VersionLabel::Parallel => format!("output_t{}.txt", config.threads),
        };
        self.out_dir.join(name)
    }

    pub fn results_log(&self) -> PathBuf {
        self.out_dir.join("results.csv")
    }
}

/// Precondition check shared by datasets and workload binaries
pub fn require_exists(path: &Path) -> Result<(), SweepError> {
    if path.exists() {
        Ok(())
    } else {
        Err(SweepError::InputNotFound {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SweepConfig {
        SweepConfig {
            iters: 3,
            tmin: 1,
            tmax: 5,
            patience: 2,
            min_gain: 0.02,
            epsilon: 1e-9,
            rule: StopRule::MinGain,
        }
    }

    #[test]
    fn test_default_tmax_at_least_two() {
        assert!(default_tmax() >= 2);
        assert_eq!(SweepConfig::default().iters, 10);
        assert_eq!(SweepConfig::default().patience, 2);
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());
        assert!(SweepConfig { iters: 0, ..config() }.validate().is_err());
        assert!(SweepConfig { tmin: 0, ..config() }.validate().is_err());
        assert!(SweepConfig { tmin: 6, ..config() }.validate().is_err());
        assert!(SweepConfig { min_gain: 1.0, ..config() }.validate().is_err());
        assert!(SweepConfig { min_gain: -0.1, ..config() }.validate().is_err());
        assert!(SweepConfig { patience: 0, min_gain: 0.0, ..config() }.validate().is_ok());
    }

    #[test]
    fn test_levels_inclusive() {
        let levels: Vec<u32> = config().levels().collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path().join("input.txt"), dir.path().join("out"));

        assert!(matches!(paths.check_inputs(), Err(SweepError::InputNotFound { .. })));
        fs::write(&paths.dataset, "2\n3\n").unwrap();
        assert!(paths.check_inputs().is_ok());

        paths.ensure_dirs().unwrap();
        assert!(paths.out_dir.is_dir());
        assert_eq!(
            paths.output_for(&Configuration::parallel(7)),
            dir.path().join("out").join("output_t7.txt")
        );
        assert_eq!(
            paths.output_for(&Configuration::sequential()),
            dir.path().join("out").join("output_seq.txt")
        );
    }
}
