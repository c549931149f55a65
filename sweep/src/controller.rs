//! Sweep Controller
//!
//! Greedy online search over increasing thread counts. Each level is
//! sampled, compared against the best mean seen so far, and the sweep
//! stops once `patience` consecutive levels fail to show progress.
//!
//! The stopping rule keeps two overlapping guards. A level is a new best
//! when `mean < best - epsilon`. Otherwise its relative gain
//! `(best - mean) / best` is compared with `min_gain`, and a gain at or
//! above it also resets the patience counter. With a positive `min_gain`
//! the second guard can only fire for a mean that is already below the
//! best, which the first guard catches, so in practice it only matters
//! when `min_gain` is zero or smaller than `epsilon / best`.
//!
//! [`StopRule`] selects whether a new best always resets the counter
//! ([`StopRule::Literal`]) or only when its gain reaches `min_gain`
//! ([`StopRule::MinGain`], the default).

use crate::collector::SampleCollector;
use crate::config::{StopRule, SweepConfig};
use crate::error::SweepError;
use crate::workload::Workload;
use serde::{Deserialize, Serialize};
use timing::{Configuration, SampleSet};
use tracing::{info, warn};

/// Controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SweepPhase {
    Scanning,
    StoppedEarly,
    Exhausted,
}

/// What the stopping rule made of one level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelVerdict {
    /// Strictly below the previous best; gain is 1.0 for the first level
    NewBest { gain: f64 },
    /// Strictly below the previous best, but by less than `min_gain`
    MarginalBest { gain: f64, streak: u32 },
    /// Not a new best, but the relative gain still met `min_gain`
    GainAccepted { gain: f64 },
    /// Neither; `streak` is the updated no-improvement count
    NoImprovement { gain: f64, streak: u32 },
}

impl LevelVerdict {
    pub fn gain(&self) -> f64 {
        match *self {
            LevelVerdict::NewBest { gain }
            | LevelVerdict::MarginalBest { gain, .. }
            | LevelVerdict::GainAccepted { gain }
            | LevelVerdict::NoImprovement { gain, .. } => gain,
        }
    }

    /// No-improvement count after this level, if it counted against patience
    pub fn streak(&self) -> Option<u32> {
        match *self {
            LevelVerdict::MarginalBest { streak, .. } | LevelVerdict::NoImprovement { streak, .. } => {
                Some(streak)
            }
            _ => None,
        }
    }
}

/// Best mean so far plus the consecutive no-improvement counter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepState {
    best_mean: f64,
    no_improve: u32,
}

impl SweepState {
    pub fn new() -> Self {
        Self {
            best_mean: f64::INFINITY,
            no_improve: 0,
        }
    }

    pub fn best_mean(&self) -> f64 {
        self.best_mean
    }

    pub fn no_improve(&self) -> u32 {
        self.no_improve
    }

    /// Apply the stopping rule to one level's mean
    pub fn observe(&mut self, mean: f64, config: &SweepConfig) -> LevelVerdict {
        let prior = self.best_mean;

        if mean < prior - config.epsilon {
            let gain = if prior.is_finite() {
                (prior - mean) / prior
            } else {
                1.0
            };
            self.best_mean = mean;

            if config.rule == StopRule::MinGain && gain < config.min_gain {
                self.no_improve += 1;
                return LevelVerdict::MarginalBest {
                    gain,
                    streak: self.no_improve,
                };
            }
            self.no_improve = 0;
            return LevelVerdict::NewBest { gain };
        }

        let gain = if prior.is_finite() {
            (prior - mean) / prior
        } else {
            0.0
        };

        if gain >= config.min_gain {
            self.no_improve = 0;
            LevelVerdict::GainAccepted { gain }
        } else {
            self.no_improve += 1;
            LevelVerdict::NoImprovement {
                gain,
                streak: self.no_improve,
            }
        }
    }
}

impl Default for SweepState {
    fn default() -> Self {
        Self::new()
    }
}

/// Trace of one visited level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepStep {
    pub threads: u32,
    pub mean_ms: f64,
    pub std_ms: f64,
    pub verdict: LevelVerdict,
    pub best_mean_ms: f64,         // after this level
}

/// Everything one sweep produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub config: SweepConfig,
    pub phase: SweepPhase,
    pub sample_sets: Vec<SampleSet>,
    pub steps: Vec<SweepStep>,
    pub optimum: Configuration,
    pub optimum_mean_ms: f64,
}

impl SweepResult {
    fn finish(
        config: SweepConfig,
        phase: SweepPhase,
        sample_sets: Vec<SampleSet>,
        steps: Vec<SweepStep>,
    ) -> Result<Self, SweepError> {
        // First minimum wins on ties
        let (optimum, optimum_mean_ms) = sample_sets
            .iter()
            .map(|s| (s.config(), s.mean_ms()))
            .fold(None::<(Configuration, f64)>, |best, cur| match best {
                Some(b) if b.1 <= cur.1 => Some(b),
                _ => Some(cur),
            })
            .ok_or(SweepError::EmptyResult)?;

        Ok(Self {
            config,
            phase,
            sample_sets,
            steps,
            optimum,
            optimum_mean_ms,
        })
    }

    /// Highest thread count actually sampled
    pub fn max_threads_evaluated(&self) -> Option<u32> {
        self.sample_sets.iter().map(|s| s.config().threads).max()
    }
}

/// Drives the sampler across levels and decides when to stop
pub struct SweepController<W: Workload> {
    collector: SampleCollector<W>,
    config: SweepConfig,
    state: SweepState,
    phase: SweepPhase,
}

impl<W: Workload> SweepController<W> {
    pub fn new(collector: SampleCollector<W>, config: SweepConfig) -> Self {
        Self {
            collector,
            config,
            state: SweepState::new(),
            phase: SweepPhase::Scanning,
        }
    }

    /// Run the sweep to a terminal phase.
    ///
    /// Any trial failure aborts the sweep; the error names the configuration
    /// and trial where it happened.
    pub fn run(mut self) -> Result<SweepResult, SweepError> {
        self.config.validate()?;
        let cfg = self.config;

        info!(
            tmin = cfg.tmin,
            tmax = cfg.tmax,
            iters = cfg.iters,
            patience = cfg.patience,
            min_gain = cfg.min_gain,
            rule = ?cfg.rule,
            "starting thread sweep"
        );

        let mut sample_sets = Vec::new();
        let mut steps = Vec::new();

        for threads in cfg.levels() {
            let set = self.collector.collect(Configuration::parallel(threads), cfg.iters)?;
            let (mean_ms, std_ms) = (set.mean_ms(), set.std_ms());

            let verdict = self.state.observe(mean_ms, &cfg);
            match verdict {
                LevelVerdict::NewBest { gain } => {
                    info!(threads, mean_ms, gain_pct = gain * 100.0, "new best")
                }
                LevelVerdict::GainAccepted { gain } => {
                    info!(threads, mean_ms, gain_pct = gain * 100.0, "gain above threshold, continuing")
                }
                LevelVerdict::MarginalBest { gain, streak } | LevelVerdict::NoImprovement { gain, streak } => info!(
                    threads,
                    mean_ms,
                    gain_pct = gain * 100.0,
                    streak,
                    patience = cfg.patience,
                    "no relevant gain"
                ),
            }

            sample_sets.push(set);
            steps.push(SweepStep {
                threads,
                mean_ms,
                std_ms,
                verdict,
                best_mean_ms: self.state.best_mean(),
            });

            if let Some(streak) = verdict.streak() {
                if streak >= cfg.patience {
                    warn!(threads, streak, "stopping early: no relevant gain");
                    self.phase = SweepPhase::StoppedEarly;
                    break;
                }
            }
        }

        if self.phase == SweepPhase::Scanning {
            self.phase = SweepPhase::Exhausted;
        }

        SweepResult::finish(cfg, self.phase, sample_sets, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunPaths;
    use crate::error::ExecutionError;
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Returns a fixed time per thread count, optionally failing one trial
    struct ByLevel {
        times: BTreeMap<u32, f64>,
        fail_at: Option<(u32, u32)>,   // (threads, trial)
        trial_counts: BTreeMap<u32, u32>,
    }

    impl ByLevel {
        fn new(times: &[(u32, f64)]) -> Self {
            Self {
                times: times.iter().copied().collect(),
                fail_at: None,
                trial_counts: BTreeMap::new(),
            }
        }

        fn visited(&self) -> Vec<u32> {
            self.trial_counts.keys().copied().collect()
        }
    }

    impl Workload for ByLevel {
        fn invoke(
            &mut self,
            config: &Configuration,
            _dataset: &Path,
            _output: &Path,
        ) -> Result<f64, ExecutionError> {
            let trial = self.trial_counts.entry(config.threads).or_insert(0);
            *trial += 1;
            if self.fail_at == Some((config.threads, *trial)) {
                return Err(ExecutionError::Execution {
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            Ok(self.times[&config.threads])
        }
    }

    fn config(tmax: u32) -> SweepConfig {
        SweepConfig {
            iters: 3,
            tmin: 1,
            tmax,
            patience: 2,
            min_gain: 0.02,
            epsilon: 1e-9,
            rule: StopRule::MinGain,
        }
    }

    fn sweep(workload: &mut ByLevel, cfg: SweepConfig) -> Result<SweepResult, SweepError> {
        let collector = SampleCollector::new(workload, RunPaths::new("in.txt", "out"));
        SweepController::new(collector, cfg).run()
    }

    #[test]
    fn test_state_first_level_is_new_best() {
        let mut state = SweepState::new();
        assert_eq!(state.best_mean(), f64::INFINITY);
        assert_eq!(
            state.observe(1000.0, &config(5)),
            LevelVerdict::NewBest { gain: 1.0 }
        );
        assert_eq!(state.best_mean(), 1000.0);
    }

    #[test]
    fn test_state_gain_branch_with_zero_min_gain() {
        let cfg = SweepConfig {
            min_gain: 0.0,
            ..config(5)
        };
        let mut state = SweepState::new();
        state.observe(500.0, &cfg);
        // equal mean: not strict, but gain 0 >= min_gain 0
        assert_eq!(state.observe(500.0, &cfg), LevelVerdict::GainAccepted { gain: 0.0 });
        assert_eq!(state.no_improve(), 0);
    }

    #[test]
    fn test_state_epsilon_blocks_tiny_improvement() {
        let cfg = SweepConfig {
            epsilon: 1.0,
            ..config(5)
        };
        let mut state = SweepState::new();
        state.observe(100.0, &cfg);
        let verdict = state.observe(99.5, &cfg);
        assert!(matches!(verdict, LevelVerdict::NoImprovement { streak: 1, .. }));
        assert_eq!(state.best_mean(), 100.0);
    }

    #[test]
    fn test_documented_scenario_stops_early() {
        let mut wl = ByLevel::new(&[(1, 1000.0), (2, 600.0), (3, 590.0), (4, 592.0), (5, 591.0)]);
        let result = sweep(&mut wl, config(5)).unwrap();

        assert_eq!(result.phase, SweepPhase::StoppedEarly);
        assert_eq!(wl.visited(), vec![1, 2, 3, 4]);
        assert_eq!(result.max_threads_evaluated(), Some(4));
        assert_eq!(result.optimum, Configuration::parallel(3));
        assert_eq!(result.optimum_mean_ms, 590.0);

        assert_eq!(result.steps[0].verdict, LevelVerdict::NewBest { gain: 1.0 });
        assert!(matches!(result.steps[1].verdict, LevelVerdict::NewBest { .. }));
        // t3 is the lowest mean, but only 1.67% better than t2
        match result.steps[2].verdict {
            LevelVerdict::MarginalBest { gain, streak } => {
                assert!((gain - 10.0 / 600.0).abs() < 1e-12);
                assert_eq!(streak, 1);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(result.steps[2].best_mean_ms, 590.0);
        assert!(matches!(
            result.steps[3].verdict,
            LevelVerdict::NoImprovement { streak: 2, .. }
        ));
    }

    #[test]
    fn test_literal_rule_resets_on_any_strict_improvement() {
        let mut wl = ByLevel::new(&[(1, 1000.0), (2, 600.0), (3, 590.0), (4, 592.0), (5, 591.0)]);
        let cfg = SweepConfig {
            rule: StopRule::Literal,
            ..config(5)
        };
        let result = sweep(&mut wl, cfg).unwrap();

        assert_eq!(wl.visited(), vec![1, 2, 3, 4, 5]);
        assert!(matches!(result.steps[2].verdict, LevelVerdict::NewBest { .. }));
        // counter reaches patience on the last level
        assert_eq!(result.phase, SweepPhase::StoppedEarly);
        assert_eq!(result.optimum, Configuration::parallel(3));
    }

    #[test]
    fn test_patience_counts_consecutive_failures() {
        // 3 is worse, 4 is a new best and resets, 5 and 6 are worse
        let mut wl = ByLevel::new(&[
            (1, 1000.0),
            (2, 800.0),
            (3, 850.0),
            (4, 700.0),
            (5, 720.0),
            (6, 730.0),
            (7, 100.0),
        ]);
        let result = sweep(&mut wl, config(7)).unwrap();

        assert_eq!(result.phase, SweepPhase::StoppedEarly);
        assert_eq!(result.max_threads_evaluated(), Some(6));
        assert_eq!(result.optimum, Configuration::parallel(4));
        assert!(matches!(
            result.steps.last().unwrap().verdict,
            LevelVerdict::NoImprovement { streak: 2, .. }
        ));
    }

    #[test]
    fn test_strictly_decreasing_exhausts_all_levels() {
        let times: Vec<(u32, f64)> = (1..=6).map(|t| (t, 1200.0 / t as f64)).collect();
        let mut wl = ByLevel::new(&times);
        let result = sweep(&mut wl, SweepConfig { tmin: 2, ..config(6) }).unwrap();

        assert_eq!(result.phase, SweepPhase::Exhausted);
        assert_eq!(wl.visited(), vec![2, 3, 4, 5, 6]);
        assert_eq!(result.sample_sets.len(), 5);
        assert!(result.sample_sets.iter().all(|s| s.len() == 3));
        assert_eq!(result.optimum, Configuration::parallel(6));
    }

    #[test]
    fn test_zero_patience_stops_on_first_miss() {
        let mut wl = ByLevel::new(&[(1, 100.0), (2, 150.0), (3, 50.0)]);
        let result = sweep(&mut wl, SweepConfig { patience: 0, ..config(3) }).unwrap();
        assert_eq!(result.phase, SweepPhase::StoppedEarly);
        assert_eq!(wl.visited(), vec![1, 2]);
    }

    #[test]
    fn test_failure_aborts_sweep_with_context() {
        let mut wl = ByLevel::new(&[(1, 1000.0), (2, 600.0), (3, 500.0)]);
        wl.fail_at = Some((2, 2));

        let err = sweep(&mut wl, config(3)).unwrap_err();
        match &err {
            SweepError::Trial { config, trial, .. } => {
                assert_eq!(*config, Configuration::parallel(2));
                assert_eq!(*trial, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.failed_config(), Some(Configuration::parallel(2)));
        // level 3 was never attempted
        assert_eq!(wl.visited(), vec![1, 2]);
    }

    #[test]
    fn test_invalid_config_rejected_before_sampling() {
        let mut wl = ByLevel::new(&[(1, 1.0)]);
        let err = sweep(&mut wl, SweepConfig { iters: 0, ..config(3) }).unwrap_err();
        assert!(matches!(err, SweepError::InvalidConfig(_)));
        assert!(wl.visited().is_empty());
    }

    #[test]
    fn test_result_serializes_phase_names() {
        let mut wl = ByLevel::new(&[(1, 10.0)]);
        let result = sweep(&mut wl, config(1)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["phase"], "EXHAUSTED");
        assert_eq!(json["steps"][0]["verdict"]["kind"], "new_best");
    }
}
