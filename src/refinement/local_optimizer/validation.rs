//! Validation helpers for local refinement.
//!
//! This module centralizes the consistency checks used across the
//! refinement interface:
//!
//! - **Tolerance checks**: [`verify_tol_f`], [`verify_tol_x`],
//!   [`verify_tol_grad`] ensure tolerances are finite and strictly positive
//!   when provided.
//! - **Inputs**: [`validate_start_point`] rejects empty or non-finite
//!   starting points.
//! - **Derivatives**: [`validate_grad`] and [`validate_hessian`] enforce
//!   shape and finiteness.
//! - **Outcomes**: [`validate_best_param`] ensures the optimizer produced a
//!   finite refined point.
use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::types::{Grad, Hessian, Point},
};

/// Validate the optional function-value tolerance.
///
/// # Errors
/// Returns [`RefineError::InvalidTolF`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_f(tol: Option<f64>) -> RefineResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(RefineError::InvalidTolF { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(RefineError::InvalidTolF { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional parameter-change tolerance.
///
/// # Errors
/// Returns [`RefineError::InvalidTolX`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_x(tol: Option<f64>) -> RefineResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(RefineError::InvalidTolX { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(RefineError::InvalidTolX { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional gradient-norm tolerance.
///
/// # Errors
/// Returns [`RefineError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> RefineResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(RefineError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(RefineError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a starting point: non-empty and every coordinate finite.
///
/// # Errors
/// - [`RefineError::EmptyStartPoint`] for a zero-length vector.
/// - [`RefineError::InvalidStartPoint`] with the first offending coordinate.
pub fn validate_start_point(x0: &Point) -> RefineResult<()> {
    if x0.is_empty() {
        return Err(RefineError::EmptyStartPoint);
    }
    for (index, &value) in x0.iter().enumerate() {
        if !value.is_finite() {
            return Err(RefineError::InvalidStartPoint {
                index,
                value,
                reason: "Coordinates must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`RefineError::GradientDimMismatch`] if length does not match `dim`.
/// - [`RefineError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> RefineResult<()> {
    if grad.len() != dim {
        return Err(RefineError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(RefineError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap the optimizer's best parameter vector.
///
/// # Errors
/// - [`RefineError::MissingBestParam`] if the solver produced none.
/// - [`RefineError::InvalidBestParam`] if any element is non-finite.
pub fn validate_best_param(best: Option<Point>) -> RefineResult<Point> {
    match best {
        Some(x) => {
            for (index, &value) in x.iter().enumerate() {
                if !value.is_finite() {
                    return Err(RefineError::InvalidBestParam {
                        index,
                        value,
                        reason: "Refined coordinates must be finite.",
                    });
                }
            }
            Ok(x)
        }
        None => Err(RefineError::MissingBestParam),
    }
}

/// Validate the shape and entries of a Hessian matrix.
///
/// # Errors
/// - [`RefineError::HessianDimMismatch`] if dimensions are not `dim × dim`.
/// - [`RefineError::InvalidHessian`] for the first non-finite entry.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> RefineResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(RefineError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    for ((row, col), &value) in hessian.indexed_iter() {
        if !value.is_finite() {
            return Err(RefineError::InvalidHessian { row, col, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the accept/reject boundaries of each validator. They
    // intentionally do not exercise the optimizer itself.
    // -------------------------------------------------------------------------

    #[test]
    fn tolerances_accept_none_and_positive_values() {
        assert!(verify_tol_f(None).is_ok());
        assert!(verify_tol_x(Some(1e-10)).is_ok());
        assert!(verify_tol_grad(Some(1.0)).is_ok());
    }

    #[test]
    fn tolerances_reject_zero_negative_and_non_finite() {
        assert!(matches!(verify_tol_f(Some(0.0)), Err(RefineError::InvalidTolF { .. })));
        assert!(matches!(verify_tol_x(Some(-1.0)), Err(RefineError::InvalidTolX { .. })));
        assert!(matches!(
            verify_tol_grad(Some(f64::INFINITY)),
            Err(RefineError::InvalidTolGrad { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // An empty start point is a caller bug and must be reported as such.
    fn validate_start_point_rejects_empty_vector() {
        let x0: Point = Array1::zeros(0);
        assert_eq!(validate_start_point(&x0), Err(RefineError::EmptyStartPoint));
    }

    #[test]
    fn validate_start_point_reports_first_non_finite_coordinate() {
        // Arrange
        let x0 = array![0.0, f64::NAN, f64::INFINITY];

        // Act
        let err = validate_start_point(&x0).expect_err("NaN coordinate must be rejected");

        // Assert
        match err {
            RefineError::InvalidStartPoint { index, .. } => assert_eq!(index, 1),
            other => panic!("Expected InvalidStartPoint, got {other:?}"),
        }
    }

    #[test]
    fn validate_grad_checks_length_then_finiteness() {
        assert!(matches!(
            validate_grad(&array![1.0, 2.0], 3),
            Err(RefineError::GradientDimMismatch { expected: 3, found: 2 })
        ));
        assert!(matches!(
            validate_grad(&array![1.0, f64::NAN], 2),
            Err(RefineError::InvalidGradient { index: 1, .. })
        ));
        assert!(validate_grad(&array![1.0, 2.0], 2).is_ok());
    }

    #[test]
    fn validate_best_param_requires_present_finite_vector() {
        assert_eq!(validate_best_param(None), Err(RefineError::MissingBestParam));
        assert!(matches!(
            validate_best_param(Some(array![f64::NEG_INFINITY])),
            Err(RefineError::InvalidBestParam { index: 0, .. })
        ));
        assert_eq!(validate_best_param(Some(array![0.5])), Ok(array![0.5]));
    }

    #[test]
    fn validate_hessian_rejects_wrong_shape_and_nan_entries() {
        let wrong: Hessian = Array2::zeros((2, 3));
        assert!(matches!(
            validate_hessian(&wrong, 2),
            Err(RefineError::HessianDimMismatch { expected: 2, found: (2, 3) })
        ));

        let mut bad: Hessian = Array2::eye(2);
        bad[[1, 0]] = f64::NAN;
        assert!(matches!(
            validate_hessian(&bad, 2),
            Err(RefineError::InvalidHessian { row: 1, col: 0, .. })
        ));
    }
}
