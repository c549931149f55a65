//! Fixed-grid benchmark
//!
//! Runs the sequential baseline and a fixed set of thread counts, then
//! aggregates the workload's shared results log and reports speedup.

use anyhow::{Context, Result};
use clap::Parser;
use results_log::{clear, read_log, to_measurements};
use std::path::PathBuf;
use thread_sweep::args::{init_logging, WorkloadArgs};
use thread_sweep::config::require_exists;
use thread_sweep::export::write_json;
use thread_sweep::{FixedGrid, SampleCollector};
use timing::Report;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Benchmark the sequential baseline against fixed thread counts")]
struct Args {
    #[command(flatten)]
    workload: WorkloadArgs,

    /// Runs per configuration
    #[arg(long, default_value_t = 10)]
    iters: u32,

    /// Parallel thread counts to benchmark
    #[arg(long, value_delimiter = ',', default_values_t = [5, 10])]
    threads: Vec<u32>,

    /// Shared results log written by the workload [default: <out-dir>/results.csv]
    #[arg(long)]
    results_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let paths = args.workload.paths();
    paths.check_inputs()?;
    if let Some(program) = args.workload.program_path() {
        require_exists(program)?;
    }
    paths.ensure_dirs()?;

    let log_path = args.results_log.clone().unwrap_or_else(|| paths.results_log());
    clear(&log_path)?;
    info!(log = %log_path.display(), "cleared results log");

    let grid = FixedGrid::new(args.iters, args.threads.clone());
    println!("=== Fixed-Grid Benchmark ===");
    println!(
        "{} runs each of: {}\n",
        grid.iters,
        grid.configurations()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut collector = SampleCollector::new(args.workload.workload(), paths.clone());
    let sets = grid.run(&mut collector).context("benchmark aborted")?;

    // The log is the workload's own record; fall back to our captures if it wrote none
    let report = if log_path.exists() {
        let rows = read_log(&log_path).with_context(|| format!("reading {}", log_path.display()))?;
        Report::from_measurements(&to_measurements(&rows))?
    } else {
        info!("workload wrote no results log, aggregating captured times");
        Report::from_sample_sets(&sets)?
    };
    let report = report.with_speedup()?;

    println!("\n=== Results ===");
    print!("{}", report.render_table());
    println!(
        "\nFastest: {} ({:.1} ms)",
        report.optimum, report.optimum_mean_ms
    );

    let json_path = paths.out_dir.join("report.json");
    write_json(&json_path, &report)?;
    println!("Report: {}", json_path.display());
    Ok(())
}
