//! High-level entry point for refining one candidate point.
//!
//! [`Refiner::refine`] validates the start point, evaluates `f(x0)`, picks a
//! [`Strategy`] from the configured [`Method`](super::traits::Method), and
//! runs it on a watchdog thread so that the per-point wall-clock budget is
//! enforced even if the solver never returns on its own.
use std::{sync::Arc, time::Instant};

use tracing::{debug, debug_span, warn};

use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::{
        result::RefinementResult,
        strategy::{LocalOptimizer, Strategy},
        traits::{Objective, RefineOptions},
        types::Point,
        validation::validate_start_point,
        watchdog::{RunControl, WatchdogOutcome, run_with_deadline},
    },
};

/// Local refiner configured once and applied to many start points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Refiner {
    opts: RefineOptions,
}

impl Refiner {
    pub fn new(opts: RefineOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &RefineOptions {
        &self.opts
    }

    /// Refine `x0` to a nearby local minimum of `objective`.
    ///
    /// # Behavior
    /// - Validates `x0` (non-empty, finite).
    /// - Evaluates `f(x0)` on the calling thread. A NaN/∞ value returns
    ///   immediately with `converged = false`, reason `error`, `f_calls = 1`
    ///   and zero elapsed time.
    /// - Runs the selected strategy on a worker thread. If the timeout
    ///   expires first, the result is flagged `timed_out` with the best
    ///   point evaluated so far.
    /// - Objective errors and panics inside the run become a recorded
    ///   failure (`value_refined = +∞`, `error_message` set) when
    ///   `robust_mode` is on, and an `Err` otherwise.
    ///
    /// # Call accounting
    /// `f_calls` counts the initial evaluation plus every cost evaluation
    /// requested by the solver; `g_calls` counts gradient requests;
    /// `h_calls` is always 0.
    ///
    /// # Errors
    /// - [`RefineError::EmptyStartPoint`] / [`RefineError::InvalidStartPoint`].
    /// - Objective failures, solver errors and
    ///   [`RefineError::ObjectivePanicked`] when `robust_mode` is off.
    /// - [`RefineError::BackendError`] if the worker thread cannot start.
    ///
    /// # Example
    /// ```no_run
    /// use std::sync::Arc;
    /// use ndarray::array;
    /// use critpoint_refine::refinement::local_optimizer::{FnObjective, RefineOptions, Refiner};
    ///
    /// let objective = Arc::new(FnObjective::new(|x: &ndarray::Array1<f64>| x.dot(x)));
    /// let refiner = Refiner::new(RefineOptions::default());
    /// let res = refiner.refine(objective, &array![0.3, -0.2])?;
    /// assert!(res.value_refined <= res.value_raw);
    /// # Ok::<(), critpoint_refine::refinement::errors::RefineError>(())
    /// ```
    pub fn refine<O>(&self, objective: Arc<O>, x0: &Point) -> RefineResult<RefinementResult>
    where
        O: Objective + ?Sized + 'static,
    {
        let _span = debug_span!("refine", dim = x0.len()).entered();
        validate_start_point(x0)?;
        let opts = &self.opts;
        let start = Instant::now();

        let value_raw = match objective.value(x0) {
            Ok(v) => v,
            Err(err) if opts.robust_mode => {
                warn!(error = %err, "objective failed at start point");
                return Ok(RefinementResult::failed(
                    x0.clone(),
                    f64::NAN,
                    err.to_string(),
                    1,
                    0,
                    start.elapsed(),
                ));
            }
            Err(err) => return Err(err),
        };
        if !value_raw.is_finite() {
            warn!(value = value_raw, "non-finite objective at start point; skipping refinement");
            return Ok(RefinementResult::non_finite_start(x0.clone(), value_raw));
        }

        let control = Arc::new(RunControl::new(opts.timeout.map(|t| start + t)));
        control.observe(x0, value_raw);
        let strategy = Strategy::from_method(&opts.method);
        let job = {
            let objective = Arc::clone(&objective);
            let control = Arc::clone(&control);
            let x0 = x0.clone();
            let opts = opts.clone();
            move || strategy.run(objective.as_ref(), x0, &opts, &control)
        };
        let outcome = run_with_deadline(&control, job)?;
        let elapsed = start.elapsed();
        let f_calls = 1 + control.f_calls();
        let g_calls = control.g_calls();

        let result = match outcome {
            WatchdogOutcome::Finished(Ok(run)) => {
                RefinementResult::from_run(x0.clone(), value_raw, run, f_calls, g_calls, elapsed)
            }
            WatchdogOutcome::TimedOut | WatchdogOutcome::Finished(Err(RefineError::DeadlineExceeded)) => {
                control.cancel();
                warn!(elapsed_ms = elapsed.as_millis() as u64, "refinement timed out");
                RefinementResult::timed_out(
                    x0.clone(),
                    value_raw,
                    control.best(),
                    f_calls,
                    g_calls,
                    elapsed,
                )
            }
            WatchdogOutcome::Finished(Err(err)) => {
                if !opts.robust_mode {
                    return Err(err);
                }
                warn!(error = %err, "refinement failed");
                RefinementResult::failed(x0.clone(), value_raw, err.to_string(), f_calls, g_calls, elapsed)
            }
            WatchdogOutcome::Panicked(text) => {
                if !opts.robust_mode {
                    return Err(RefineError::ObjectivePanicked { text });
                }
                warn!(panic = %text, "objective panicked during refinement");
                RefinementResult::failed(x0.clone(), value_raw, text, f_calls, g_calls, elapsed)
            }
        };
        debug!(
            reason = %result.convergence_reason,
            converged = result.converged,
            iterations = result.iterations,
            f_calls = result.f_calls,
            value_refined = result.value_refined,
            "refinement finished"
        );
        Ok(result)
    }
}

/// Refine one point with the given options. See [`Refiner::refine`].
///
/// # Errors
/// Same as [`Refiner::refine`].
pub fn refine<O>(objective: Arc<O>, x0: &Point, opts: &RefineOptions) -> RefineResult<RefinementResult>
where
    O: Objective + ?Sized + 'static,
{
    Refiner::new(opts.clone()).refine(objective, x0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::local_optimizer::{
        diagnostics::ConvergenceReason,
        traits::{FnObjective, Method, Tolerances},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Normal refinement and call accounting.
    // - Non-finite start values, objective failures and panics in both
    //   robust and strict modes.
    // - The wall-clock timeout path.
    // -------------------------------------------------------------------------

    fn opts(robust_mode: bool, timeout: Duration) -> RefineOptions {
        let tols = Tolerances::new(Some(1e-14), Some(1e-12), Some(1e-8), Some(2000))
            .expect("Tolerances should be valid");
        RefineOptions::new(Method::DerivativeFree, tols, Some(timeout), robust_mode, None)
            .expect("RefineOptions should be valid")
    }

    #[test]
    // Purpose
    // -------
    // A smooth bowl is refined to its minimizer and the accounting is
    // consistent with the invariants of the result.
    fn refine_quadratic_converges() {
        // Arrange
        let objective = Arc::new(FnObjective::new(|p: &Point| (p[0] - 2.0).powi(2) + p[1].powi(2)));
        let refiner = Refiner::new(opts(true, Duration::from_secs(10)));

        // Act
        let res = refiner.refine(objective, &array![1.5, 0.4]).expect("refine");

        // Assert
        assert!(res.converged);
        assert!(!res.timed_out);
        assert_abs_diff_eq!(res.refined[0], 2.0, epsilon = 1e-5);
        assert!(res.value_refined <= res.value_raw);
        assert_eq!(res.improvement, (res.value_refined - res.value_raw).abs());
        assert!(res.f_calls > 1);
        assert_eq!(res.h_calls, 0);
        assert_ne!(res.convergence_reason, ConvergenceReason::Timeout);
    }

    #[test]
    fn refine_rejects_empty_start_point() {
        let objective = Arc::new(FnObjective::new(|_: &Point| 0.0));
        let err = refine(objective, &Point::zeros(0), &RefineOptions::default()).expect_err("empty");
        assert_eq!(err, RefineError::EmptyStartPoint);
    }

    #[test]
    // Purpose
    // -------
    // A NaN at the start point short-circuits with minimal accounting.
    fn refine_non_finite_start_returns_error_reason() {
        let objective = Arc::new(FnObjective::new(|_: &Point| f64::NAN));
        let res = refine(objective, &array![0.0], &opts(false, Duration::from_secs(1))).expect("result");
        assert!(!res.converged);
        assert_eq!(res.convergence_reason, ConvergenceReason::Error);
        assert_eq!(res.f_calls, 1);
        assert_eq!(res.g_calls, 0);
        assert_eq!(res.time_elapsed, Duration::ZERO);
    }

    struct FailsAwayFromStart;

    impl Objective for FailsAwayFromStart {
        fn value(&self, x: &Point) -> RefineResult<f64> {
            if x[0] == 1.0 { Ok(1.0) } else { Err(RefineError::objective("outside domain")) }
        }
    }

    #[test]
    fn refine_objective_failure_is_recorded_in_robust_mode() {
        let res = refine(Arc::new(FailsAwayFromStart), &array![1.0], &opts(true, Duration::from_secs(5)))
            .expect("robust result");
        assert_eq!(res.value_refined, f64::INFINITY);
        assert!(res.error_message.as_deref().is_some_and(|m| m.contains("outside domain")));
        assert_eq!(res.convergence_reason, ConvergenceReason::Error);
    }

    #[test]
    fn refine_objective_failure_is_returned_in_strict_mode() {
        let err = refine(Arc::new(FailsAwayFromStart), &array![1.0], &opts(false, Duration::from_secs(5)))
            .expect_err("strict mode");
        assert_eq!(err, RefineError::objective("outside domain"));
    }

    /// Σ(xᵢ − 0.5)² inside the open box |xᵢ| < 1, `+∞` outside.
    fn boxed_bowl(p: &Point) -> f64 {
        if p.iter().all(|v| v.abs() < 1.0) { p.mapv(|v| (v - 0.5).powi(2)).sum() } else { f64::INFINITY }
    }

    #[test]
    // Purpose
    // -------
    // A finite start next to an infinite barrier still refines: vertices
    // beyond the barrier are rejected by the simplex, not treated as errors.
    //
    // Given
    // -----
    // - `boxed_bowl` with starts whose initial simplex pokes through the
    //   box wall.
    //
    // Expect
    // ------
    // - Converged, no error message, refined point near (0.5, 0.5).
    fn refine_tolerates_infinite_values_beyond_a_barrier() {
        for x0 in [array![0.98, 0.98], array![-0.97, 0.99], array![0.99, -0.99]] {
            // Arrange
            let objective = Arc::new(FnObjective::new(boxed_bowl));

            // Act
            let res = refine(objective, &x0, &opts(false, Duration::from_secs(10))).expect("refine");

            // Assert
            assert!(res.converged, "start {x0} ended with {:?}", res.convergence_reason);
            assert!(res.error_message.is_none());
            assert!(res.value_refined.is_finite());
            assert!(res.value_refined < res.value_raw);
            assert_abs_diff_eq!(res.refined[0], 0.5, epsilon = 1e-4);
            assert_abs_diff_eq!(res.refined[1], 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn refine_robust_failure_message_is_the_objective_error() {
        let res = refine(Arc::new(FailsAwayFromStart), &array![1.0], &opts(true, Duration::from_secs(5)))
            .expect("robust result");
        let message = res.error_message.expect("error message");
        assert!(!message.contains("unwrap"));
        assert_eq!(message, RefineError::objective("outside domain").to_string());
    }

    struct PanicsAwayFromStart;

    impl Objective for PanicsAwayFromStart {
        fn value(&self, x: &Point) -> RefineResult<f64> {
            if x[0] == 1.0 { Ok(1.0) } else { panic!("kaboom") }
        }
    }

    #[test]
    // Purpose
    // -------
    // A panic inside the worker never crosses into the caller.
    fn refine_panic_is_captured() {
        let res = refine(Arc::new(PanicsAwayFromStart), &array![1.0], &opts(true, Duration::from_secs(5)))
            .expect("robust result");
        assert_eq!(res.error_message.as_deref(), Some("kaboom"));

        let err = refine(Arc::new(PanicsAwayFromStart), &array![1.0], &opts(false, Duration::from_secs(5)))
            .expect_err("strict mode");
        assert_eq!(err, RefineError::ObjectivePanicked { text: "kaboom".to_string() });
    }

    struct Slow;

    impl Objective for Slow {
        fn value(&self, x: &Point) -> RefineResult<f64> {
            std::thread::sleep(Duration::from_millis(20));
            Ok(x.dot(x))
        }
    }

    #[test]
    // Purpose
    // -------
    // A slow objective exceeding the budget yields a timed-out result that
    // still reports a point no worse than the start.
    //
    // Expect
    // ------
    // - timed_out = true, reason = timeout, converged = false.
    // - value_refined ≤ value_raw.
    fn refine_times_out_with_best_point_so_far() {
        // Arrange
        let opts = opts(true, Duration::from_millis(150));

        // Act
        let res = refine(Arc::new(Slow), &array![1.0, 1.0], &opts).expect("timed-out result");

        // Assert
        assert!(res.timed_out);
        assert!(!res.converged);
        assert_eq!(res.convergence_reason, ConvergenceReason::Timeout);
        assert!(res.value_refined <= res.value_raw);
        assert!(res.time_elapsed < Duration::from_secs(2));
    }
}
