//! Inspect a results log
//!
//! Prints the aggregated per-configuration report of a `results.csv` file.

use anyhow::{Context, Result};
use clap::Parser;
use results_log::{read_log, to_measurements};
use std::path::PathBuf;
use timing::Report;

#[derive(Parser, Debug)]
#[command(about = "Summarize a shared results log")]
struct Args {
    /// Results log to read
    #[arg(default_value = "out/results.csv")]
    log: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Loading {}...", args.log.display());
    let rows = read_log(&args.log).with_context(|| format!("reading {}", args.log.display()))?;
    println!("Rows: {}", rows.len());

    let report = Report::from_measurements(&to_measurements(&rows))?;
    let report = match report.clone().with_speedup() {
        Ok(with_speedup) => with_speedup,
        Err(e) => {
            println!("Speedup unavailable: {}", e);
            report
        }
    };

    println!("\n=== Configurations ===");
    print!("{}", report.render_table());

    println!("\n=== Optimum ===");
    println!("{} ({:.1} ms)", report.optimum, report.optimum_mean_ms);
    Ok(())
}
