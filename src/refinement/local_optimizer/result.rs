//! local_optimizer::result — the per-point refinement record.
//!
//! A [`RefinementResult`] is created once per candidate and never mutated.
//! Constructors cover every way a refinement can end: a normal solver stop,
//! a timeout, a recorded failure (robust mode), and a non-finite start.
use crate::refinement::local_optimizer::{
    diagnostics::{ConvergenceFlags, ConvergenceReason},
    strategy::LocalRun,
    types::{Cost, Point},
};
use std::time::Duration;

/// Outcome of refining one candidate point.
///
/// Invariants:
/// - `improvement == |value_refined − value_raw|` whenever both are finite.
/// - `convergence_reason == Timeout` iff `timed_out`.
/// - `error_message.is_some()` implies `!converged` and reason `Error`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefinementResult {
    pub raw: Point,
    pub refined: Point,
    pub value_raw: Cost,
    pub value_refined: Cost,
    pub improvement: f64,
    pub converged: bool,
    pub iterations: u64,
    pub f_calls: u64,
    pub g_calls: u64,
    pub h_calls: u64,
    pub time_elapsed: Duration,
    pub timed_out: bool,
    pub error_message: Option<String>,
    pub flags: ConvergenceFlags,
    pub convergence_reason: ConvergenceReason,
}

impl RefinementResult {
    /// Result of a solver run that stopped on its own.
    pub fn from_run(
        raw: Point, value_raw: Cost, run: LocalRun, f_calls: u64, g_calls: u64,
        time_elapsed: Duration,
    ) -> Self {
        let diagnostics = run.diagnostics;
        let convergence_reason =
            ConvergenceReason::classify(&diagnostics.flags, diagnostics.converged, false);
        Self {
            raw,
            refined: run.point,
            value_raw,
            value_refined: run.value,
            improvement: (run.value - value_raw).abs(),
            converged: diagnostics.converged,
            iterations: diagnostics.iterations,
            f_calls,
            g_calls,
            h_calls: 0,
            time_elapsed,
            timed_out: false,
            error_message: None,
            flags: diagnostics.flags,
            convergence_reason,
        }
    }

    /// Result of a run cut by the wall-clock budget.
    ///
    /// `best` is the best evaluated pair seen before the deadline; without
    /// one, the start point and its value are reported.
    pub fn timed_out(
        raw: Point, value_raw: Cost, best: Option<(Point, Cost)>, f_calls: u64, g_calls: u64,
        time_elapsed: Duration,
    ) -> Self {
        let (refined, value_refined) = match best {
            Some((x, v)) if v <= value_raw => (x, v),
            _ => (raw.clone(), value_raw),
        };
        let flags = ConvergenceFlags::default();
        Self {
            raw,
            refined,
            value_raw,
            value_refined,
            improvement: (value_refined - value_raw).abs(),
            converged: false,
            iterations: 0,
            f_calls,
            g_calls,
            h_calls: 0,
            time_elapsed,
            timed_out: true,
            error_message: None,
            flags,
            convergence_reason: ConvergenceReason::Timeout,
        }
    }

    /// Failure recorded in robust mode: refined value is `+∞` and the
    /// refined point is the start point.
    pub fn failed(
        raw: Point, value_raw: Cost, message: impl Into<String>, f_calls: u64, g_calls: u64,
        time_elapsed: Duration,
    ) -> Self {
        let flags = ConvergenceFlags::default();
        Self {
            refined: raw.clone(),
            raw,
            value_raw,
            value_refined: f64::INFINITY,
            improvement: (f64::INFINITY - value_raw).abs(),
            converged: false,
            iterations: 0,
            f_calls,
            g_calls,
            h_calls: 0,
            time_elapsed,
            timed_out: false,
            error_message: Some(message.into()),
            flags,
            convergence_reason: ConvergenceReason::classify(&flags, false, false),
        }
    }

    /// Start point whose objective value is NaN or infinite; no solver run.
    pub fn non_finite_start(raw: Point, value_raw: Cost) -> Self {
        let flags = ConvergenceFlags::default();
        Self {
            refined: raw.clone(),
            raw,
            value_raw,
            value_refined: value_raw,
            improvement: 0.0,
            converged: false,
            iterations: 0,
            f_calls: 1,
            g_calls: 0,
            h_calls: 0,
            time_elapsed: Duration::ZERO,
            timed_out: false,
            error_message: Some(format!("non-finite objective value at start point: {value_raw}")),
            flags,
            convergence_reason: ConvergenceReason::Error,
        }
    }

    pub fn dim(&self) -> usize {
        self.raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::local_optimizer::{
        diagnostics::StopCause,
        strategy::RunDiagnostics,
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the result constructors and their invariants.
    // -------------------------------------------------------------------------

    #[test]
    fn from_run_computes_improvement_and_reason() {
        // Arrange
        let run = LocalRun {
            point: array![1.0],
            value: 0.25,
            diagnostics: RunDiagnostics {
                iterations: 12,
                flags: ConvergenceFlags { f_converged: true, ..Default::default() },
                converged: true,
                stop: StopCause::SolverConverged,
            },
        };

        // Act
        let res =
            RefinementResult::from_run(array![0.0], 1.0, run, 30, 0, Duration::from_millis(3));

        // Assert
        assert_eq!(res.improvement, 0.75);
        assert_eq!(res.iterations, 12);
        assert_eq!(res.convergence_reason, ConvergenceReason::FTol);
        assert!(res.converged && !res.timed_out);
        assert_eq!(res.h_calls, 0);
    }

    #[test]
    // Purpose
    // -------
    // A timed-out result reports the best point seen and the timeout label.
    fn timed_out_reports_best_point_so_far() {
        let res = RefinementResult::timed_out(
            array![2.0],
            4.0,
            Some((array![1.5], 2.25)),
            17,
            0,
            Duration::from_millis(50),
        );
        assert!(res.timed_out);
        assert!(!res.converged);
        assert_eq!(res.refined, array![1.5]);
        assert_eq!(res.value_refined, 2.25);
        assert_eq!(res.convergence_reason, ConvergenceReason::Timeout);
    }

    #[test]
    fn timed_out_without_progress_falls_back_to_start() {
        let res = RefinementResult::timed_out(array![2.0], 4.0, None, 1, 0, Duration::ZERO);
        assert_eq!(res.refined, array![2.0]);
        assert_eq!(res.value_refined, 4.0);
        assert_eq!(res.improvement, 0.0);
    }

    #[test]
    fn failed_result_carries_message_and_infinite_value() {
        let res = RefinementResult::failed(array![0.0], 1.0, "boom", 3, 1, Duration::ZERO);
        assert_eq!(res.error_message.as_deref(), Some("boom"));
        assert_eq!(res.value_refined, f64::INFINITY);
        assert_eq!(res.convergence_reason, ConvergenceReason::Error);
        assert!(!res.converged);
    }

    #[test]
    fn non_finite_start_is_minimal() {
        let res = RefinementResult::non_finite_start(array![0.0, 1.0], f64::NAN);
        assert_eq!(res.f_calls, 1);
        assert_eq!(res.g_calls, 0);
        assert_eq!(res.time_elapsed, Duration::ZERO);
        assert_eq!(res.convergence_reason, ConvergenceReason::Error);
        assert!(res.error_message.is_some());
    }
}
