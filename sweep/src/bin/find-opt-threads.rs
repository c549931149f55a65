//! Optimal thread count finder
//!
//! Sweeps thread counts tmin..=tmax with `iters` runs each and stops early
//! once `patience` consecutive counts bring no relevant gain.

use anyhow::{Context, Result};
use clap::Parser;
use thread_sweep::args::{init_logging, SweepArgs, WorkloadArgs};
use thread_sweep::config::require_exists;
use thread_sweep::export::{write_json, write_records_csv};
use thread_sweep::{SampleCollector, SweepController};
use timing::Report;

#[derive(Parser, Debug)]
#[command(about = "Find the thread count with the lowest mean run time")]
struct Args {
    #[command(flatten)]
    workload: WorkloadArgs,

    #[command(flatten)]
    sweep: SweepArgs,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    let config = args.sweep.resolve();
    config.validate()?;

    let paths = args.workload.paths();
    paths.check_inputs()?;
    if let Some(program) = args.workload.program_path() {
        require_exists(program)?;
    }
    paths.ensure_dirs()?;

    println!("=== Thread Sweep ===");
    println!(
        "Threads {}..={}, {} runs each, patience {}, min gain {:.2}%, rule {:?}\n",
        config.tmin,
        config.tmax,
        config.iters,
        config.patience,
        config.min_gain * 100.0,
        config.rule
    );

    let collector = SampleCollector::new(args.workload.workload(), paths.clone());
    let result = SweepController::new(collector, config)
        .run()
        .context("thread sweep aborted")?;

    println!("{:<10} {:>12} {:>12} {:>10}  {}", "Threads", "Mean (ms)", "Std (ms)", "Gain", "Verdict");
    println!("{:-<70}", "");
    for step in &result.steps {
        println!(
            "{:<10} {:>12.1} {:>12.1} {:>9.2}%  {:?}",
            step.threads,
            step.mean_ms,
            step.std_ms,
            step.verdict.gain() * 100.0,
            step.verdict
        );
    }

    let report = Report::from_sample_sets(&result.sample_sets)?;

    let records_path = paths.out_dir.join("threads_sweep.csv");
    write_records_csv(&records_path, &result.sample_sets)?;
    let json_path = paths.out_dir.join("sweep.json");
    write_json(
        &json_path,
        &serde_json::json!({ "sweep": &result, "report": &report }),
    )?;

    println!("\n=== Result ===");
    println!("Stopped: {:?}", result.phase);
    println!(
        "Optimal threads (lowest mean): {}  |  {:.1} ms",
        result.optimum.threads, result.optimum_mean_ms
    );
    println!("Records: {}", records_path.display());
    println!("Report: {}", json_path.display());
    Ok(())
}
