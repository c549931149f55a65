//! Error types

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use timing::{Configuration, ReportError};

/// Failure of a single workload invocation
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("workload exited with {status}: {stderr}")]
    Execution { status: String, stderr: String },

    #[error("no elapsed time found in workload output line: {line:?}")]
    Parse { line: String },

    #[error("workload did not finish within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("I/O error while waiting for workload: {0}")]
    Io(#[from] io::Error),
}

/// Failure of a sweep or benchmark run
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("required input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{config} trial {trial} failed: {source}")]
    Trial {
        config: Configuration,
        trial: u32,
        #[source]
        source: ExecutionError,
    },

    #[error("run produced no sample sets")]
    EmptyResult,

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Log(#[from] results_log::LogError),

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// Helper to wrap I/O errors with the operation that failed
    pub fn io(source: io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            operation: operation.into(),
        }
    }

    /// Concurrency level at which a trial failed, if any
    pub fn failed_config(&self) -> Option<Configuration> {
        match self {
            SweepError::Trial { config, .. } => Some(*config),
            _ => None,
        }
    }
}
