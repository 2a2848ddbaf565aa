//! analysis::gradient — confirm refined points are stationary.
//!
//! Purpose
//! -------
//! Convergence flags say the optimizer stopped; they do not prove
//! `∇f(x) ≈ 0` (an `x_tol` stop on a plateau is the classic counterexample).
//! [`GradientValidator`] recomputes `‖∇f(x)‖` at each refined point and
//! accepts it iff the norm is strictly below a tolerance.
//!
//! Key behaviors
//! -------------
//! - Gradients come from the objective's analytic gradient, or from central
//!   or forward finite differences, as chosen by [`GradientMethod`].
//!   `Auto` prefers the analytic gradient and falls back to central
//!   differences when none is implemented.
//! - Points are processed in parallel with rayon; output order matches the
//!   input order.
//! - A point whose gradient cannot be computed is recorded as invalid with
//!   no norm and an error message; the batch is never aborted.
use crate::{
    analysis::errors::{AnalysisResult, verify_positive},
    refinement::{
        errors::{RefineError, RefineResult},
        local_optimizer::{
            finite_diff::{FdScheme, numerical_gradient},
            traits::{Objective, RefineOptions},
            types::{Grad, Point},
            validation::validate_grad,
        },
    },
};
use rayon::prelude::*;

/// How gradients are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GradientMethod {
    #[default]
    Auto,
    Analytic,
    Central,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientValidatorOptions {
    pub tolerance: f64,
    pub method: GradientMethod,
}

impl GradientValidatorOptions {
    /// # Errors
    /// `AnalysisError::InvalidTolerance` unless `tolerance` is finite and > 0.
    pub fn new(tolerance: f64, method: GradientMethod) -> AnalysisResult<Self> {
        verify_positive("gradient tolerance", tolerance)?;
        Ok(Self { tolerance, method })
    }

    /// Tie the tolerance to the refinement's function tolerance:
    /// `sqrt(f_tol)`, or the default when `f_tol` is unset.
    pub fn from_refine_options(opts: &RefineOptions) -> Self {
        let tolerance = opts.tols.f_tol.map(f64::sqrt).unwrap_or(Self::default().tolerance);
        Self { tolerance, method: GradientMethod::Auto }
    }
}

impl Default for GradientValidatorOptions {
    fn default() -> Self {
        Self { tolerance: 1e-6, method: GradientMethod::Auto }
    }
}

/// Gradient check at one point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointGradient {
    /// `‖∇f(x)‖`, absent when the gradient could not be computed.
    pub norm: Option<f64>,
    pub valid: bool,
    pub error: Option<String>,
}

/// Aggregate of a validation pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientValidation {
    pub n_valid: usize,
    pub n_invalid: usize,
    /// Mean over the points with a computed norm.
    pub mean_norm: Option<f64>,
    pub max_norm: Option<f64>,
    pub per_point: Vec<PointGradient>,
}

impl GradientValidation {
    /// `n_valid / n`, absent for an empty batch.
    pub fn validation_rate(&self) -> Option<f64> {
        let n = self.n_valid + self.n_invalid;
        (n > 0).then(|| self.n_valid as f64 / n as f64)
    }

    fn from_points(per_point: Vec<PointGradient>) -> Self {
        let n_valid = per_point.iter().filter(|p| p.valid).count();
        let norms: Vec<f64> = per_point.iter().filter_map(|p| p.norm).collect();
        let mean_norm = (!norms.is_empty()).then(|| norms.iter().sum::<f64>() / norms.len() as f64);
        let max_norm = norms.iter().copied().reduce(f64::max);
        Self { n_valid, n_invalid: per_point.len() - n_valid, mean_norm, max_norm, per_point }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientValidator {
    opts: GradientValidatorOptions,
}

impl GradientValidator {
    pub fn new(opts: GradientValidatorOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &GradientValidatorOptions {
        &self.opts
    }

    /// validate — gradient norms and validity for every point.
    ///
    /// A point is valid iff its gradient is computable, finite, and
    /// `‖∇f(x)‖ < tolerance`.
    pub fn validate<O: Objective + ?Sized>(&self, points: &[Point], objective: &O) -> GradientValidation {
        let per_point: Vec<PointGradient> =
            points.par_iter().map(|x| self.check_point(objective, x)).collect();
        GradientValidation::from_points(per_point)
    }

    /// Gradient at `x` by the configured method.
    ///
    /// # Errors
    /// - [`RefineError::GradientNotImplemented`] for `Analytic` when the
    ///   objective has no gradient.
    /// - Objective failures and gradient validation errors.
    pub fn gradient<O: Objective + ?Sized>(&self, objective: &O, x: &Point) -> RefineResult<Grad> {
        let grad = match self.opts.method {
            GradientMethod::Analytic => objective.gradient(x)?,
            GradientMethod::Central => numerical_gradient(objective, x, FdScheme::Central)?,
            GradientMethod::Forward => numerical_gradient(objective, x, FdScheme::Forward)?,
            GradientMethod::Auto => match objective.gradient(x) {
                Ok(g) => g,
                Err(RefineError::GradientNotImplemented) => {
                    numerical_gradient(objective, x, FdScheme::Central)?
                }
                Err(e) => return Err(e),
            },
        };
        validate_grad(&grad, x.len())?;
        Ok(grad)
    }

    /// `‖∇f(x)‖` by the configured method.
    ///
    /// # Errors
    /// Same as [`GradientValidator::gradient`].
    pub fn gradient_norm<O: Objective + ?Sized>(&self, objective: &O, x: &Point) -> RefineResult<f64> {
        let grad = self.gradient(objective, x)?;
        Ok(grad.dot(&grad).sqrt())
    }

    fn check_point<O: Objective + ?Sized>(&self, objective: &O, x: &Point) -> PointGradient {
        match self.gradient_norm(objective, x) {
            Ok(norm) => PointGradient { norm: Some(norm), valid: norm < self.opts.tolerance, error: None },
            Err(e) => PointGradient { norm: None, valid: false, error: Some(e.to_string()) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::local_optimizer::traits::{FnObjective, Tolerances};
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validity decisions at stationary and non-stationary points.
    // - Method selection (analytic, FD, auto fallback).
    // - Aggregates, including points whose gradient fails.
    // -------------------------------------------------------------------------

    fn bowl() -> impl Objective {
        FnObjective::new(|p: &Point| p.dot(p))
    }

    #[test]
    // Purpose
    // -------
    // Stationary points pass, a sloped point fails, and the aggregates
    // follow the per-point results.
    //
    // Given
    // -----
    // - f(x) = ‖x‖², points (0, 0), (1e-9, 0), (1, 0).
    fn validate_separates_stationary_points() {
        // Arrange
        let validator = GradientValidator::default();
        let points = vec![array![0.0, 0.0], array![1e-9, 0.0], array![1.0, 0.0]];

        // Act
        let report = validator.validate(&points, &bowl());

        // Assert
        assert_eq!(report.n_valid, 2);
        assert_eq!(report.n_invalid, 1);
        assert_eq!(report.per_point.iter().map(|p| p.valid).collect::<Vec<_>>(), vec![true, true, false]);
        assert_relative_eq!(report.max_norm.expect("max"), 2.0, epsilon = 1e-6);
        assert_relative_eq!(report.validation_rate().expect("rate"), 2.0 / 3.0);
    }

    #[test]
    fn analytic_method_requires_gradient() {
        let opts = GradientValidatorOptions::new(1e-6, GradientMethod::Analytic).expect("opts");
        let validator = GradientValidator::new(opts);
        assert_eq!(
            validator.gradient(&bowl(), &array![1.0]),
            Err(RefineError::GradientNotImplemented)
        );
    }

    #[test]
    fn auto_prefers_analytic_gradient() {
        let objective = FnObjective::new(|p: &Point| p.dot(p)).with_gradient(|p: &Point| 2.0 * p);
        let validator = GradientValidator::default();
        let g = validator.gradient(&objective, &array![1.0, 2.0]).expect("gradient");
        assert_eq!(g, array![2.0, 4.0]);
    }

    #[test]
    fn forward_method_is_close_to_truth() {
        let opts = GradientValidatorOptions::new(1e-3, GradientMethod::Forward).expect("opts");
        let norm = GradientValidator::new(opts).gradient_norm(&bowl(), &array![3.0, 4.0]).expect("norm");
        assert_relative_eq!(norm, 10.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // A failing objective marks the point invalid without a norm and does
    // not disturb the other points.
    fn failing_points_are_recorded_not_raised() {
        struct HalfPlane;
        impl Objective for HalfPlane {
            fn value(&self, x: &Point) -> RefineResult<f64> {
                if x[0] < 0.0 { Err(RefineError::objective("x < 0")) } else { Ok(x[0] * x[0]) }
            }
        }
        let report = GradientValidator::default().validate(&[array![0.5], array![-1.0]], &HalfPlane);
        assert!(report.per_point[0].norm.is_some());
        assert_eq!(report.per_point[1].norm, None);
        assert!(!report.per_point[1].valid);
        assert!(report.per_point[1].error.is_some());
        assert_eq!(report.mean_norm, report.per_point[0].norm);
    }

    #[test]
    fn empty_batch_has_no_rate() {
        let report = GradientValidator::default().validate(&[], &bowl());
        assert_eq!(report.validation_rate(), None);
        assert_eq!(report.mean_norm, None);
    }

    #[test]
    fn from_refine_options_uses_sqrt_of_f_tol() {
        let mut opts = RefineOptions::default();
        opts.tols = Tolerances::new(Some(1e-12), None, None, Some(10)).expect("tols");
        let gv = GradientValidatorOptions::from_refine_options(&opts);
        assert_relative_eq!(gv.tolerance, 1e-6);
        assert!(GradientValidatorOptions::new(-1.0, GradientMethod::Auto).is_err());
    }
}
