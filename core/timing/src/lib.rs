//! Timing Data Model
//!
//! Elapsed-time measurements keyed by (version, threads) configuration,
//! plus the aggregate report built from a finished record set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::str::FromStr;
use thiserror::Error;

/// Workload mode under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VersionLabel {
    #[serde(rename = "seq", alias = "sequential")]
    Sequential,
    #[serde(rename = "par", alias = "parallel")]
    Parallel,
}

impl VersionLabel {
    /// Mode token passed to the workload on its command line
    pub fn mode_token(&self) -> &'static str {
        match self {
            VersionLabel::Sequential => "seq",
            VersionLabel::Parallel => "par",
        }
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_token())
    }
}

impl FromStr for VersionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seq" | "sequential" => Ok(VersionLabel::Sequential),
            "par" | "parallel" => Ok(VersionLabel::Parallel),
            other => Err(format!("unknown version label: {}", other)),
        }
    }
}

/// A (version label, concurrency level) pair under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub version: VersionLabel,
    pub threads: u32,
}

impl Configuration {
    /// Speedup reference: sequential, one thread
    pub const BASELINE: Configuration = Configuration {
        version: VersionLabel::Sequential,
        threads: 1,
    };

    pub fn sequential() -> Self {
        Self::BASELINE
    }

    pub fn parallel(threads: u32) -> Self {
        Self {
            version: VersionLabel::Parallel,
            threads,
        }
    }

    pub fn is_baseline(&self) -> bool {
        *self == Self::BASELINE
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.threads)
    }
}

/// One elapsed-time observation; immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub config: Configuration,
    pub run_idx: u32,              // 1-based within its configuration
    pub ms: f64,
    pub captured_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(config: Configuration, run_idx: u32, ms: f64) -> Self {
        Self::at(config, run_idx, ms, Utc::now())
    }

    pub fn at(config: Configuration, run_idx: u32, ms: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            config,
            run_idx,
            ms,
            captured_at,
        }
    }
}

/// Arithmetic mean (0 for an empty slice)
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation (no Bessel correction); 0 for fewer than two samples
pub fn population_std(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let var = samples.iter().map(|s| (s - m).powi(2)).sum::<f64>() / samples.len() as f64;
    var.sqrt()
}

/// Summary statistics over one configuration's samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub runs: usize,
    pub mean_ms: f64,
    pub std_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl Summary {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self {
            runs: samples.len(),
            mean_ms: mean(samples),
            std_ms: population_std(samples),
            min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Ordered measurements of a single configuration from one collector pass.
///
/// Measurements can only be added through [`SampleSet::record`], which stamps
/// them with this set's configuration and the next run index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    config: Configuration,
    measurements: Vec<Measurement>,
}

impl SampleSet {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            measurements: Vec::new(),
        }
    }

    /// Append the next trial's elapsed time
    pub fn record(&mut self, ms: f64) -> &Measurement {
        let run_idx = self.measurements.len() as u32 + 1;
        self.measurements.push(Measurement::new(self.config, run_idx, ms));
        &self.measurements[self.measurements.len() - 1]
    }

    pub fn config(&self) -> Configuration {
        self.config
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn times_ms(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.ms).collect()
    }

    pub fn mean_ms(&self) -> f64 {
        mean(&self.times_ms())
    }

    pub fn std_ms(&self) -> f64 {
        population_std(&self.times_ms())
    }

    pub fn summary(&self) -> Option<Summary> {
        Summary::from_samples(&self.times_ms())
    }
}

/// Aggregation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("no baseline configuration ({}) in the record set; cannot compute speedup", Configuration::BASELINE)]
    NoBaseline,

    #[error("record set is empty; nothing to aggregate")]
    EmptyResult,
}

/// Per-configuration aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigStats {
    pub config: Configuration,
    pub runs: usize,
    pub mean_ms: f64,
    pub std_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub speedup: Option<f64>,       // baseline_mean / mean_ms
}

/// Aggregate report over a finished record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub configs: Vec<ConfigStats>,  // ordered by configuration
    pub optimum: Configuration,
    pub optimum_mean_ms: f64,
}

impl Report {
    /// Aggregate raw measurements, grouping by configuration
    pub fn from_measurements<'a, I>(records: I) -> Result<Self, ReportError>
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let mut groups: BTreeMap<Configuration, Vec<f64>> = BTreeMap::new();
        for m in records {
            groups.entry(m.config).or_default().push(m.ms);
        }

        let configs: Vec<ConfigStats> = groups
            .into_iter()
            .filter_map(|(config, samples)| {
                Summary::from_samples(&samples).map(|s| ConfigStats {
                    config,
                    runs: s.runs,
                    mean_ms: s.mean_ms,
                    std_ms: s.std_ms,
                    min_ms: s.min_ms,
                    max_ms: s.max_ms,
                    speedup: None,
                })
            })
            .collect();

        // First minimum wins on ties
        let best = configs
            .iter()
            .fold(None::<&ConfigStats>, |best, c| match best {
                Some(b) if b.mean_ms <= c.mean_ms => Some(b),
                _ => Some(c),
            })
            .ok_or(ReportError::EmptyResult)?;

        let (optimum, optimum_mean_ms) = (best.config, best.mean_ms);

        Ok(Self {
            configs,
            optimum,
            optimum_mean_ms,
        })
    }

    /// Aggregate a sequence of sample sets
    pub fn from_sample_sets(sets: &[SampleSet]) -> Result<Self, ReportError> {
        Self::from_measurements(sets.iter().flat_map(|s| s.measurements()))
    }

    pub fn get(&self, config: &Configuration) -> Option<&ConfigStats> {
        self.configs.iter().find(|c| c.config == *config)
    }

    pub fn baseline(&self) -> Option<&ConfigStats> {
        self.get(&Configuration::BASELINE)
    }

    pub fn optimum_stats(&self) -> Option<&ConfigStats> {
        self.get(&self.optimum)
    }

    /// Fill in speedup against the (seq, 1) baseline
    pub fn with_speedup(mut self) -> Result<Self, ReportError> {
        let baseline_mean = self.baseline().ok_or(ReportError::NoBaseline)?.mean_ms;

        for stats in &mut self.configs {
            stats.speedup = Some(if stats.config.is_baseline() {
                1.0
            } else {
                baseline_mean / stats.mean_ms
            });
        }
        Ok(self)
    }

    /// Fixed-width table for terminal output
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<12} {:>6} {:>12} {:>12} {:>12} {:>12} {:>9}",
            "Config", "Runs", "Mean (ms)", "Std (ms)", "Min (ms)", "Max (ms)", "Speedup"
        );
        let _ = writeln!(out, "{:-<81}", "");
        for c in &self.configs {
            let speedup = c
                .speedup
                .map(|s| format!("{:.2}x", s))
                .unwrap_or_else(|| "-".to_string());
            let marker = if c.config == self.optimum { " *" } else { "" };
            let _ = writeln!(
                out,
                "{:<12} {:>6} {:>12.1} {:>12.1} {:>12.1} {:>12.1} {:>9}{}",
                c.config.to_string(),
                c.runs,
                c.mean_ms,
                c.std_ms,
                c.min_ms,
                c.max_ms,
                speedup,
                marker
            );
        }
        out
    }
}
