//! batch::summary — per-point comparison records and batch statistics.
//!
//! Purpose
//! -------
//! Define the record shapes that reporting and export layers consume: one
//! [`ComparisonRecord`] per candidate and one [`BatchSummary`] per batch.
//! Nothing here performs I/O; with the `serde` feature the types serialize
//! directly.
//!
//! Conventions
//! -----------
//! - `convergence_reason` is carried as its string label.
//! - Times are seconds as `f64`.
//! - Statistics over an empty set are `None`, never a sentinel.
use crate::{
    analysis::gradient::{GradientValidation, PointGradient},
    refinement::local_optimizer::{diagnostics::ConvergenceReason, result::RefinementResult},
};
use std::collections::BTreeMap;

/// Flat raw-vs-refined record for one candidate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonRecord {
    pub raw: Vec<f64>,
    pub refined: Vec<f64>,
    pub value_raw: f64,
    pub value_refined: f64,
    pub converged: bool,
    pub iterations: u64,
    pub f_calls: u64,
    pub g_calls: u64,
    pub h_calls: u64,
    pub time_elapsed: f64,
    pub x_converged: bool,
    pub f_converged: bool,
    pub g_converged: bool,
    pub iteration_limit_reached: bool,
    pub convergence_reason: String,
    pub gradient_norm: Option<f64>,
    pub gradient_valid: bool,
}

impl ComparisonRecord {
    pub fn new(result: &RefinementResult, gradient: &PointGradient) -> Self {
        Self {
            raw: result.raw.to_vec(),
            refined: result.refined.to_vec(),
            value_raw: result.value_raw,
            value_refined: result.value_refined,
            converged: result.converged,
            iterations: result.iterations,
            f_calls: result.f_calls,
            g_calls: result.g_calls,
            h_calls: result.h_calls,
            time_elapsed: result.time_elapsed.as_secs_f64(),
            x_converged: result.flags.x_converged,
            f_converged: result.flags.f_converged,
            g_converged: result.flags.g_converged,
            iteration_limit_reached: result.flags.iteration_limit_reached,
            convergence_reason: result.convergence_reason.to_string(),
            gradient_norm: gradient.norm,
            gradient_valid: gradient.valid,
        }
    }
}

/// Mean, min and max of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// `None` for an empty sample.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            n += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (n > 0).then(|| Self { mean: sum / n as f64, min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingStats {
    pub elapsed: Option<Stats>,
    pub n_timeouts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientStats {
    pub n_valid: usize,
    pub n_invalid: usize,
    pub mean_norm: Option<f64>,
    pub max_norm: Option<f64>,
    pub validation_rate: Option<f64>,
}

impl From<&GradientValidation> for GradientStats {
    fn from(v: &GradientValidation) -> Self {
        Self {
            n_valid: v.n_valid,
            n_invalid: v.n_invalid,
            mean_norm: v.mean_norm,
            max_norm: v.max_norm,
            validation_rate: v.validation_rate(),
        }
    }
}

/// Aggregate view of a batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchSummary {
    pub n_raw: usize,
    pub n_converged: usize,
    /// `n_converged / n_raw`; `None` for an empty batch.
    pub convergence_rate: Option<f64>,
    /// Lowest finite raw value.
    pub best_raw_value: Option<f64>,
    /// Lowest finite refined value.
    pub best_refined_value: Option<f64>,
    /// Count per reason; every reason is present, zero-filled.
    pub reasons: BTreeMap<ConvergenceReason, usize>,
    pub f_calls: Option<Stats>,
    pub g_calls: Option<Stats>,
    pub timing: TimingStats,
    pub gradient: GradientStats,
}

impl BatchSummary {
    pub fn from_results(results: &[RefinementResult], gradient: &GradientValidation) -> Self {
        let n_raw = results.len();
        let n_converged = results.iter().filter(|r| r.converged).count();
        let mut reasons: BTreeMap<ConvergenceReason, usize> =
            ConvergenceReason::ALL.into_iter().map(|r| (r, 0)).collect();
        for r in results {
            *reasons.entry(r.convergence_reason).or_insert(0) += 1;
        }
        Self {
            n_raw,
            n_converged,
            convergence_rate: (n_raw > 0).then(|| n_converged as f64 / n_raw as f64),
            best_raw_value: best_finite(results.iter().map(|r| r.value_raw)),
            best_refined_value: best_finite(results.iter().map(|r| r.value_refined)),
            reasons,
            f_calls: Stats::from_values(results.iter().map(|r| r.f_calls as f64)),
            g_calls: Stats::from_values(results.iter().map(|r| r.g_calls as f64)),
            timing: TimingStats {
                elapsed: Stats::from_values(results.iter().map(|r| r.time_elapsed.as_secs_f64())),
                n_timeouts: results.iter().filter(|r| r.timed_out).count(),
            },
            gradient: GradientStats::from(gradient),
        }
    }

    pub fn reason_count(&self, reason: ConvergenceReason) -> usize {
        self.reasons.get(&reason).copied().unwrap_or(0)
    }
}

fn best_finite<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    values.filter(|v| v.is_finite()).reduce(f64::min)
}
