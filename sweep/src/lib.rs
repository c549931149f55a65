//! Thread Sweep
//!
//! Measures an external workload at increasing thread counts and searches
//! for the count with the lowest mean run time.
//!
//! Layers, leaves first: [`workload`] launches one run and scrapes its
//! elapsed time, [`collector`] repeats it for one configuration,
//! [`controller`] walks the thread counts and decides when to stop, and
//! [`timing::Report`] aggregates the records.

pub mod args;
pub mod collector;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod grid;
pub mod workload;

pub use collector::SampleCollector;
pub use config::{RunPaths, StopRule, SweepConfig};
pub use controller::{LevelVerdict, SweepController, SweepPhase, SweepResult, SweepState, SweepStep};
pub use error::{ExecutionError, SweepError};
pub use grid::FixedGrid;
pub use workload::{parse_elapsed_ms, ProcessWorkload, Workload};
