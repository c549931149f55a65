//! CLI arguments shared by the driver binaries

use crate::config::{default_tmax, RunPaths, StopRule, SweepConfig};
use crate::workload::ProcessWorkload;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Which workload to launch and where its files live
#[derive(Args, Clone, Debug)]
pub struct WorkloadArgs {
    /// Workload program (e.g. `java`, or a path to a native binary)
    #[arg(long, env = "SWEEP_PROGRAM")]
    pub program: PathBuf,

    /// Arguments placed before the mode token (e.g. `-cp target/classes app.Main`)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub prefix_args: Vec<String>,

    /// Input dataset handed to every run
    #[arg(long, env = "SWEEP_DATASET", default_value = "data/input.txt")]
    pub dataset: PathBuf,

    /// Directory for output artifacts and reports
    #[arg(long, env = "SWEEP_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// Kill a run that takes longer than this many seconds
    #[arg(long = "timeout-secs", value_name = "SECS", env = "SWEEP_TIMEOUT_SECS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

/// Positive, finite number of seconds
fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err("timeout must be greater than zero".to_string()),
        Err(_) => Err(format!("`{raw}` is not a usable number of seconds")),
    }
}

impl WorkloadArgs {
    pub fn paths(&self) -> RunPaths {
        RunPaths::new(&self.dataset, &self.out_dir)
    }

    pub fn workload(&self) -> ProcessWorkload {
        ProcessWorkload::new(&self.program, &self.prefix_args)
            .with_timeout(self.timeout)
    }

    /// A program given as a path must exist; bare names are looked up on PATH at spawn time
    pub fn program_path(&self) -> Option<&PathBuf> {
        (self.program.components().count() > 1).then_some(&self.program)
    }
}

/// Adaptive sweep parameters
#[derive(Args, Clone, Copy, Debug)]
pub struct SweepArgs {
    /// Trials per thread count
    #[arg(long, env = "SWEEP_ITERS", default_value_t = SweepConfig::DEFAULT_ITERS)]
    pub iters: u32,

    /// Lowest thread count
    #[arg(long, env = "SWEEP_TMIN", default_value_t = 1)]
    pub tmin: u32,

    /// Highest thread count [default: 2x logical cores]
    #[arg(long, env = "SWEEP_TMAX")]
    pub tmax: Option<u32>,

    /// Stop after this many consecutive levels without relevant gain
    #[arg(long, env = "SWEEP_PATIENCE", default_value_t = SweepConfig::DEFAULT_PATIENCE)]
    pub patience: u32,

    /// Minimum relative gain (0.02 = 2%)
    #[arg(long = "min-gain", env = "SWEEP_MIN_GAIN", default_value_t = SweepConfig::DEFAULT_MIN_GAIN)]
    pub min_gain: f64,

    /// How strict improvements below min-gain count against patience
    /// (`literal`: any new best resets patience, however small)
    #[arg(long, value_enum, env = "SWEEP_STOP_RULE", default_value_t = StopRule::MinGain)]
    pub stop_rule: StopRule,
}

impl SweepArgs {
    pub fn resolve(&self) -> SweepConfig {
        SweepConfig {
            iters: self.iters,
            tmin: self.tmin,
            tmax: self.tmax.unwrap_or_else(default_tmax),
            patience: self.patience,
            min_gain: self.min_gain,
            epsilon: SweepConfig::DEFAULT_EPSILON,
            rule: self.stop_rule,
        }
    }
}

/// Initialise `tracing` output, honouring `RUST_LOG`
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
