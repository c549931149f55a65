//! Execution Adapter
//!
//! Runs the external workload once per call and scrapes the elapsed time
//! from the last line of its standard output. The workload's own results
//! log is never consulted here.

use crate::error::ExecutionError;
use regex::Regex;
use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use timing::{Configuration, VersionLabel};
use tracing::debug;

/// Anything that can produce one elapsed-time measurement for a configuration
pub trait Workload {
    fn invoke(
        &mut self,
        config: &Configuration,
        dataset: &Path,
        output: &Path,
    ) -> Result<f64, ExecutionError>;
}

impl<W: Workload + ?Sized> Workload for &mut W {
    fn invoke(
        &mut self,
        config: &Configuration,
        dataset: &Path,
        output: &Path,
    ) -> Result<f64, ExecutionError> {
        (**self).invoke(config, dataset, output)
    }
}

/// Subprocess-backed workload.
///
/// Argument vector: `<prefix args...> <seq|par> <dataset> <output> [threads]`
#[derive(Debug, Clone)]
pub struct ProcessWorkload {
    program: OsString,
    prefix_args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ProcessWorkload {
    const POLL_INTERVAL: Duration = Duration::from_millis(5);

    pub fn new<P, I, A>(program: P, prefix_args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            prefix_args: prefix_args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Kill the workload if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn command(&self, config: &Configuration, dataset: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .arg(config.version.mode_token())
            .arg(dataset)
            .arg(output);
        if config.version == VersionLabel::Parallel {
            cmd.arg(config.threads.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> ExecutionError {
        ExecutionError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        }
    }

    /// Wait for the child, killing it at the deadline.
    ///
    /// Only the direct child is killed. If it left descendants holding the
    /// stdout/stderr pipes, the reader threads outlive this call and finish
    /// once those descendants exit; the timeout is still reported on time.
    fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ExecutionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // Already-exited races are fine; reap either way
                let _ = child.kill();
                child.wait()?;
                return Err(ExecutionError::Timeout { timeout });
            }
            thread::sleep(Self::POLL_INTERVAL);
        }
    }
}

/// Drain a pipe on its own thread so a chatty child never blocks on a full buffer
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl Workload for ProcessWorkload {
    fn invoke(
        &mut self,
        config: &Configuration,
        dataset: &Path,
        output: &Path,
    ) -> Result<f64, ExecutionError> {
        let mut cmd = self.command(config, dataset, output);
        debug!(command = ?cmd, "invoking workload");

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => Self::wait_bounded(&mut child, timeout),
            None => child.wait().map_err(ExecutionError::from),
        }?;

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(ExecutionError::Execution {
                status: status.to_string(),
                stderr: tail(&stderr, 20),
            });
        }

        parse_elapsed_ms(&stdout)
    }
}

/// Last `n` lines of a captured stream
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

fn elapsed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*ms\b").expect("elapsed-time pattern is valid"))
}

fn bare_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("bare-number pattern is valid"))
}

/// Extract elapsed milliseconds from the last non-empty stdout line.
///
/// Accepts `"...: 2055 ms"`, `"2055ms"` or a bare `"2055"`. A number
/// tagged with `ms` wins over bare numbers; among bare numbers the last
/// one on the line is taken. Numbers glued to other text (`(4`, `1.5s`)
/// are not elapsed times.
pub fn parse_elapsed_ms(stdout: &str) -> Result<f64, ExecutionError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("");

    let tagged = elapsed_pattern()
        .captures_iter(line)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    // Untagged fallback: only a token that is a plain number on its own
    let value = tagged.or_else(|| {
        line.split_whitespace()
            .rev()
            .filter(|tok| bare_number_pattern().is_match(tok))
            .find_map(|tok| tok.parse::<f64>().ok())
    });

    match value {
        Some(ms) if ms.is_finite() && ms >= 0.0 => Ok(ms),
        _ => Err(ExecutionError::Parse {
            line: line.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixed() {
        assert_eq!(parse_elapsed_ms("Parallel (10 threads): 2055 ms\n").unwrap(), 2055.0);
        assert_eq!(parse_elapsed_ms("Sequential: 812ms").unwrap(), 812.0);
        assert_eq!(parse_elapsed_ms("took 12.5 ms").unwrap(), 12.5);
    }

    #[test]
    fn test_parse_uses_last_line() {
        let out = "loading 1000 numbers\nfound 168 primes\nParalelo (4 threads): 77 ms\n\n";
        assert_eq!(parse_elapsed_ms(out).unwrap(), 77.0);
    }

    #[test]
    fn test_parse_bare_token() {
        assert_eq!(parse_elapsed_ms("2055").unwrap(), 2055.0);
        assert_eq!(parse_elapsed_ms("elapsed: 31").unwrap(), 31.0);
    }

    #[test]
    fn test_parse_prefers_ms_tag_over_thread_count() {
        assert_eq!(parse_elapsed_ms("(8 threads) 90 ms total 3").unwrap(), 90.0);
    }

    #[test]
    fn test_parse_failures_are_loud() {
        assert!(matches!(parse_elapsed_ms(""), Err(ExecutionError::Parse { .. })));
        assert!(matches!(
            parse_elapsed_ms("done, no timing here"),
            Err(ExecutionError::Parse { line }) if line == "done, no timing here"
        ));
        assert!(matches!(parse_elapsed_ms("ms"), Err(ExecutionError::Parse { .. })));
    }

    #[test]
    fn test_parse_ignores_numbers_inside_words() {
        for line in ["Paralelo (4 threads): done", "took 1.5s", "Sequential finished in 1.5s", "run #3 ok"] {
            assert!(
                matches!(parse_elapsed_ms(line), Err(ExecutionError::Parse { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn test_command_line_layout() {
        let wl = ProcessWorkload::new("java", ["-cp", "target/classes", "app.Main"]);

        let cmd = wl.command(&Configuration::parallel(6), Path::new("in.txt"), Path::new("o.txt"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-cp", "target/classes", "app.Main", "par", "in.txt", "o.txt", "6"]);

        let cmd = wl.command(&Configuration::sequential(), Path::new("in.txt"), Path::new("o.txt"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-cp", "target/classes", "app.Main", "seq", "in.txt", "o.txt"]);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("", 2), "");
    }
}
