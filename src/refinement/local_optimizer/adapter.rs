//! Adapter that exposes a user [`Objective`] as an `argmin` problem.
//!
//! The objective is minimized as-is: `CostFunction::cost` returns `f(x)` and
//! `Gradient::gradient` returns `∇f(x)`, either analytic or finite
//! differenced. Every evaluation first consults the shared [`RunControl`],
//! so a run whose deadline has passed stops at its next objective call.
//!
//! Non-finite values are rejected for gradient-based solvers. For
//! Nelder–Mead the adapter is built with [`ArgMinAdapter::penalizing`],
//! which reports them as `+∞` so the simplex step rejects that vertex.
use std::cell::RefCell;

use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::{
        finite_diff::run_fd_diff,
        traits::Objective,
        types::{Cost, Grad, Point},
        validation::validate_grad,
        watchdog::RunControl,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Bridges a user [`Objective`] to `argmin`'s `CostFunction` and `Gradient`.
///
/// - `CostFunction::cost` counts one objective evaluation, rejects
///   non-finite values with [`RefineError::NonFiniteCost`] (or maps them to
///   `+∞` when `penalize_non_finite` is set) and records finite points as
///   best-so-far candidates.
/// - `Gradient::gradient` counts one gradient evaluation and returns the
///   analytic gradient if available, else a finite-difference one. Values
///   computed for finite differences are not counted as cost calls.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, O: Objective + ?Sized> {
    pub objective: &'a O,
    pub control: &'a RunControl,
    pub penalize_non_finite: bool,
}

impl<'a, O: Objective + ?Sized> ArgMinAdapter<'a, O> {
    /// Construct a new adapter over a user objective and its run control.
    pub fn new(objective: &'a O, control: &'a RunControl) -> Self {
        Self { objective, control, penalize_non_finite: false }
    }

    /// Adapter for derivative-free solvers: NaN and `±∞` become `+∞`.
    pub fn penalizing(objective: &'a O, control: &'a RunControl) -> Self {
        Self { objective, control, penalize_non_finite: true }
    }

    /// Evaluate every vertex of a starting simplex through `cost`.
    ///
    /// Nelder–Mead's initialization cannot report a failing evaluation, so
    /// objective errors at the vertices must be surfaced before the solver
    /// runs.
    ///
    /// # Errors
    /// The first evaluation error, converted into [`RefineError`].
    pub fn check_vertices(&self, vertices: &[Point]) -> RefineResult<()> {
        for vertex in vertices {
            self.cost(vertex)?;
        }
        Ok(())
    }

    /// Evaluate `f(x)` under the deadline without touching the counters.
    fn evaluate(&self, x: &Point) -> Result<Cost, Error> {
        self.control.check()?;
        let output = self.objective.value(x)?;
        if !output.is_finite() {
            if self.penalize_non_finite {
                return Ok(f64::INFINITY);
            }
            return Err((RefineError::NonFiniteCost { value: output }).into());
        }
        self.control.observe(x, output);
        Ok(output)
    }
}

impl<'a, O: Objective + ?Sized> CostFunction for ArgMinAdapter<'a, O> {
    type Param = Point;
    type Output = Cost;

    /// Evaluate the cost `f(x)`.
    ///
    /// # Errors
    /// - [`RefineError::DeadlineExceeded`] once the run is out of budget.
    /// - Any [`RefineError`] from the user's `value`.
    /// - [`RefineError::NonFiniteCost`] if the value is not finite.
    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        self.control.record_cost_call();
        self.evaluate(x)
    }
}

impl<'a, O: Objective + ?Sized> Gradient for ArgMinAdapter<'a, O> {
    type Param = Point;
    type Gradient = Grad;

    /// Evaluate the gradient of the cost at `x`.
    ///
    /// Behavior:
    /// - If the user implements `gradient(x)`, it is validated and returned.
    /// - Otherwise a finite-difference gradient of the cost is computed:
    ///   central differences first, retried with forward differences when an
    ///   evaluation failed or validation rejected the central result.
    ///
    /// The FD closure must return `f64`, so errors are captured in
    /// `closure_err` and the closure returns `NaN`.
    ///
    /// # Errors
    /// - Propagates user errors from `gradient` other than
    ///   `GradientNotImplemented`.
    /// - Propagates errors raised by cost evaluations during FD, including a
    ///   passed deadline.
    /// - Returns validation errors for wrong dimension or non-finite entries.
    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, Error> {
        self.control.check()?;
        self.control.record_grad_call();
        let dim = x.len();
        match self.objective.gradient(x) {
            Ok(g) => {
                validate_grad(&g, dim)?;
                Ok(g)
            }
            Err(RefineError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let cost_func = |p: &Point| -> f64 {
                    match self.evaluate(p) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                let fd_grad = x.central_diff(&cost_func);
                if closure_err.borrow().is_none() && validate_grad(&fd_grad, dim).is_ok() {
                    return Ok(fd_grad);
                }
                if let Some(RefineError::DeadlineExceeded) =
                    closure_err.borrow().as_ref().and_then(|e| e.downcast_ref::<RefineError>())
                {
                    return Err(RefineError::DeadlineExceeded.into());
                }
                Ok(run_fd_diff(x, &cost_func, &closure_err)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::local_optimizer::traits::FnObjective;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::time::Instant;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Cost evaluation, call counting and best-point tracking.
    // - Analytic vs finite-difference gradients.
    // - Deadline and non-finite rejection paths.
    // -------------------------------------------------------------------------

    fn to_refine(err: Error) -> RefineError {
        err.into()
    }

    #[test]
    // Purpose
    // -------
    // `cost` returns f(x) unchanged, counts one call, and records the point.
    fn cost_counts_and_tracks_best() {
        // Arrange
        let objective = FnObjective::new(|p: &Point| p.dot(p));
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&objective, &control);

        // Act
        let c1 = adapter.cost(&array![2.0, 0.0]).expect("cost");
        let c2 = adapter.cost(&array![1.0, 0.0]).expect("cost");

        // Assert
        assert_eq!(c1, 4.0);
        assert_eq!(c2, 1.0);
        assert_eq!(control.f_calls(), 2);
        assert_eq!(control.best().map(|(_, v)| v), Some(1.0));
    }

    #[test]
    fn cost_rejects_non_finite_values() {
        let objective = FnObjective::new(|_: &Point| f64::INFINITY);
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&objective, &control);
        let err = adapter.cost(&array![0.0]).map_err(to_refine).expect_err("non-finite");
        assert!(matches!(err, RefineError::NonFiniteCost { .. }));
    }

    #[test]
    // Purpose
    // -------
    // The derivative-free adapter turns NaN and infinite values into `+∞`
    // and keeps them out of the best-so-far record.
    fn penalizing_cost_maps_non_finite_to_infinity() {
        // Arrange
        let objective = FnObjective::new(|p: &Point| if p[0] > 1.0 { f64::NAN } else { p[0] });
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::penalizing(&objective, &control);

        // Act
        let outside = adapter.cost(&array![2.0]).expect("penalized cost");
        let inside = adapter.cost(&array![0.5]).expect("cost");

        // Assert
        assert_eq!(outside, f64::INFINITY);
        assert_eq!(inside, 0.5);
        assert_eq!(control.f_calls(), 2);
        assert_eq!(control.best().map(|(_, v)| v), Some(0.5));
    }

    #[test]
    fn check_vertices_surfaces_the_first_objective_error() {
        struct FailsBelowZero;
        impl Objective for FailsBelowZero {
            fn value(&self, x: &Point) -> RefineResult<f64> {
                if x[0] < 0.0 { Err(RefineError::objective("negative")) } else { Ok(x[0]) }
            }
        }
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::penalizing(&FailsBelowZero, &control);
        assert!(adapter.check_vertices(&[array![1.0], array![2.0]]).is_ok());
        let err = adapter.check_vertices(&[array![1.0], array![-1.0]]).expect_err("vertex error");
        assert_eq!(err, RefineError::objective("negative"));
    }

    #[test]
    fn cost_fails_once_deadline_has_passed() {
        let objective = FnObjective::new(|p: &Point| p[0]);
        let control = RunControl::new(Some(Instant::now()));
        let adapter = ArgMinAdapter::new(&objective, &control);
        let err = adapter.cost(&array![0.0]).map_err(to_refine).expect_err("deadline");
        assert_eq!(err, RefineError::DeadlineExceeded);
    }

    #[test]
    fn gradient_returns_analytic_gradient_when_provided() {
        let objective =
            FnObjective::new(|p: &Point| p.dot(p)).with_gradient(|p: &Point| 2.0 * p);
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&objective, &control);
        let g = adapter.gradient(&array![1.0, -2.0]).expect("gradient");
        assert_eq!(g, array![2.0, -4.0]);
        assert_eq!(control.g_calls(), 1);
        assert_eq!(control.f_calls(), 0);
    }

    #[test]
    // Purpose
    // -------
    // Without an analytic gradient the adapter falls back to central
    // differences; FD evaluations do not inflate the cost-call counter.
    fn gradient_falls_back_to_finite_differences() {
        // Arrange
        let objective = FnObjective::new(|p: &Point| (p[0] - 1.0).powi(2) + p[1].powi(2));
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&objective, &control);

        // Act
        let g = adapter.gradient(&array![0.0, 0.5]).expect("gradient");

        // Assert
        assert_abs_diff_eq!(g[0], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(g[1], 1.0, epsilon = 1e-6);
        assert_eq!(control.f_calls(), 0);
        assert_eq!(control.g_calls(), 1);
    }

    #[test]
    fn gradient_propagates_user_errors() {
        struct BadGrad;
        impl Objective for BadGrad {
            fn value(&self, _x: &Point) -> RefineResult<f64> {
                Ok(0.0)
            }
            fn gradient(&self, _x: &Point) -> RefineResult<Grad> {
                Err(RefineError::objective("no gradient here"))
            }
        }
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&BadGrad, &control);
        let err = adapter.gradient(&array![0.0]).map_err(to_refine).expect_err("error");
        assert_eq!(err, RefineError::objective("no gradient here"));
    }

    #[test]
    fn gradient_rejects_wrong_dimension() {
        let objective = FnObjective::new(|_: &Point| 0.0).with_gradient(|_: &Point| array![1.0]);
        let control = RunControl::unbounded();
        let adapter = ArgMinAdapter::new(&objective, &control);
        let err = adapter.gradient(&array![0.0, 0.0]).map_err(to_refine).expect_err("dim");
        assert!(matches!(err, RefineError::GradientDimMismatch { expected: 2, found: 1 }));
    }
}
