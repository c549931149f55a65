//! Synthetic workload
//!
//! Honours the workload invocation contract without doing real work:
//! `fake-workload <seq|par> <input> <output> [threads]`.
//! Run time follows Amdahl's law plus a per-thread overhead and uniform
//! jitter, so a sweep over it has a real optimum.

use chrono::Local;
use rand::Rng;
use results_log::{append_row, LogRow};
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::thread;
use std::time::Duration;
use timing::VersionLabel;

/// Simulated cost model
struct CostModel {
    base_ms: f64,          // single-thread run time
    serial: f64,           // non-parallelizable fraction
    overhead_ms: f64,      // coordination cost per thread
    jitter: f64,           // +/- fraction of the total
}

impl CostModel {
    fn from_env() -> Self {
        Self {
            base_ms: env_f64("FAKE_WORKLOAD_BASE_MS", 200.0),
            serial: env_f64("FAKE_WORKLOAD_SERIAL", 0.1).clamp(0.0, 1.0),
            overhead_ms: env_f64("FAKE_WORKLOAD_OVERHEAD_MS", 4.0),
            jitter: env_f64("FAKE_WORKLOAD_JITTER", 0.02).clamp(0.0, 0.9),
        }
    }

    fn elapsed_ms<R: Rng>(&self, threads: u32, rng: &mut R) -> u64 {
        let t = threads.max(1) as f64;
        let ideal = self.base_ms * (self.serial + (1.0 - self.serial) / t);
        let cost = ideal + self.overhead_ms * (t - 1.0);
        let noise = if self.jitter > 0.0 {
            rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        (cost * (1.0 + noise)).round().max(0.0) as u64
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn usage() -> ! {
    eprintln!("Usage: fake-workload <seq|par> <input> <output> [threads]");
    process::exit(2);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        usage();
    }

    let version: VersionLabel = match args[1].parse() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            usage();
        }
    };
    let input = Path::new(&args[2]);
    let output = Path::new(&args[3]);

    let threads = match version {
        VersionLabel::Sequential => 1,
        VersionLabel::Parallel => match args.get(4).map(|s| s.parse::<u32>()) {
            Some(Ok(t)) if t > 0 => t,
            None => 5,
            _ => {
                eprintln!("threads must be a positive integer");
                usage();
            }
        },
    };

    let data = match fs::read_to_string(input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("cannot read {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    let model = CostModel::from_env();
    let ms = model.elapsed_ms(threads, &mut rand::thread_rng());
    if env::var_os("FAKE_WORKLOAD_NO_SLEEP").is_none() {
        thread::sleep(Duration::from_millis(ms));
    }

    let write_result = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(output, format!("{} input lines\n", data.lines().count())));
    if let Err(e) = write_result {
        eprintln!("cannot write {}: {}", output.display(), e);
        process::exit(1);
    }

    let log_path = output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("results.csv");
    let row = LogRow {
        version,
        threads,
        ms: ms as f64,
        timestamp: Local::now().fixed_offset(),
    };
    if let Err(e) = append_row(&log_path, &row) {
        eprintln!("cannot append to {}: {}", log_path.display(), e);
        process::exit(1);
    }

    match version {
        VersionLabel::Sequential => println!("Sequential: {} ms", ms),
        VersionLabel::Parallel => println!("Parallel ({} threads): {} ms", threads, ms),
    }
}
