//! local_optimizer::finite_diff — finite-difference gradients and Hessians.
//!
//! Purpose
//! -------
//! Provide finite-difference gradient and Hessian approximations around a
//! point, with error capture, validation and symmetry cleanup, so that the
//! rest of the crate can request derivatives of an [`Objective`] without
//! depending directly on the `finitediff` API.
//!
//! Key behaviors
//! -------------
//! - [`run_fd_diff`]: forward-difference gradient of a scalar closure with
//!   error capture through a shared cell.
//! - [`numerical_gradient`]: central or forward gradient of an
//!   [`Objective`]; a failing central pass retries with forward steps.
//! - [`compute_hessian`]: central Hessian of a gradient map, falling back to
//!   forward differences when validation fails.
//! - [`hessian_from_values`]: second-order central stencil for objectives
//!   without an analytic gradient.
//! - [`objective_hessian`]: picks the right path for an [`Objective`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Any error raised by the objective while differencing is routed into a
//!   `RefCell<Option<Error>>` and treated as a hard failure.
//! - Gradients and Hessians returned from here satisfy [`validate_grad`] and
//!   [`validate_hessian`]; Hessians are exactly symmetric.
use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::{
        traits::Objective,
        types::{Grad, Hessian, Point},
        validation::{validate_grad, validate_hessian},
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use ndarray::Array2;
use std::cell::RefCell;

/// Finite-difference scheme for first derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FdScheme {
    Central,
    Forward,
}

/// run_fd_diff — forward-difference gradient with error capture and validation.
///
/// `func` must write any evaluation error into `closure_err` and return
/// `NaN`; this helper clears the cell, differences, and surfaces either the
/// captured error or a validation failure.
///
/// # Errors
/// - The captured error, converted into [`RefineError`].
/// - [`RefineError::GradientDimMismatch`] / [`RefineError::InvalidGradient`]
///   from [`validate_grad`].
pub fn run_fd_diff<G: Fn(&Point) -> f64>(
    x: &Point, func: &G, closure_err: &RefCell<Option<Error>>,
) -> RefineResult<Grad> {
    closure_err.replace(None);
    let fd_grad = x.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, x.len())?;
    Ok(fd_grad)
}

/// numerical_gradient — finite-difference `∇f(x)` of an [`Objective`].
///
/// With [`FdScheme::Central`] the central pass is attempted first; if an
/// evaluation failed or the result is non-finite the forward scheme is
/// tried once before giving up.
///
/// # Errors
/// Propagates objective failures and gradient validation errors.
pub fn numerical_gradient<O: Objective + ?Sized>(
    objective: &O, x: &Point, scheme: FdScheme,
) -> RefineResult<Grad> {
    let closure_err: RefCell<Option<Error>> = RefCell::new(None);
    let func = |p: &Point| -> f64 {
        match objective.value(p) {
            Ok(v) => v,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e.into());
                }
                f64::NAN
            }
        }
    };
    match scheme {
        FdScheme::Forward => run_fd_diff(x, &func, &closure_err),
        FdScheme::Central => {
            let grad = x.central_diff(&func);
            if closure_err.borrow().is_none() && validate_grad(&grad, x.len()).is_ok() {
                return Ok(grad);
            }
            run_fd_diff(x, &func, &closure_err)
        }
    }
}

/// compute_hessian — finite-difference Hessian of a gradient map.
///
/// Central differences are preferred; any validation failure triggers a
/// forward-difference retry whose validation result is the one surfaced.
/// The returned matrix is symmetrized.
///
/// # Errors
/// - [`RefineError::HessianDimMismatch`] / [`RefineError::InvalidHessian`].
pub fn compute_hessian<F: Fn(&Point) -> Grad>(f: &F, x: &Point) -> RefineResult<Hessian> {
    let dim = x.len();
    let mut cent_hess = x.central_hessian(f);
    match validate_hessian(&cent_hess, dim) {
        Ok(()) => {
            symmetrize_hess(&mut cent_hess);
            Ok(cent_hess)
        }
        Err(_) => {
            let mut forward_hess = x.forward_hessian(f);
            validate_hessian(&forward_hess, dim)?;
            symmetrize_hess(&mut forward_hess);
            Ok(forward_hess)
        }
    }
}

/// hessian_from_values — central second-difference Hessian from values only.
///
/// Uses step `h_i = ε^{1/4} · max(1, |x_i|)`, which balances truncation and
/// rounding error for the four-point cross stencil. `finitediff`'s
/// `forward_hessian_nograd` divides by `2ε` after a `√(2ε)` step, so its
/// absolute error grows like `|f(x)|` and it cannot separate small
/// eigenvalues from zero away from `f ≈ 0`.
///
/// - `H_ii = (f(x + h_i e_i) − 2 f(x) + f(x − h_i e_i)) / h_i²`
/// - `H_ij = (f(x+h_i e_i+h_j e_j) − f(x+h_i e_i−h_j e_j)
///          − f(x−h_i e_i+h_j e_j) + f(x−h_i e_i−h_j e_j)) / (4 h_i h_j)`
///
/// # Errors
/// Propagates the first objective failure, or a validation error if any
/// entry is non-finite.
pub fn hessian_from_values<F: Fn(&Point) -> RefineResult<f64>>(
    f: &F, x: &Point,
) -> RefineResult<Hessian> {
    let dim = x.len();
    let steps: Vec<f64> =
        x.iter().map(|&xi| f64::EPSILON.powf(0.25) * xi.abs().max(1.0)).collect();
    let f0 = f(x)?;
    let mut hess: Hessian = Array2::zeros((dim, dim));
    let shifted = |moves: &[(usize, f64)]| -> RefineResult<f64> {
        let mut p = x.clone();
        for &(i, delta) in moves {
            p[i] += delta;
        }
        f(&p)
    };
    for i in 0..dim {
        let hi = steps[i];
        let plus = shifted(&[(i, hi)])?;
        let minus = shifted(&[(i, -hi)])?;
        hess[[i, i]] = (plus - 2.0 * f0 + minus) / (hi * hi);
        for j in 0..i {
            let hj = steps[j];
            let pp = shifted(&[(i, hi), (j, hj)])?;
            let pm = shifted(&[(i, hi), (j, -hj)])?;
            let mp = shifted(&[(i, -hi), (j, hj)])?;
            let mm = shifted(&[(i, -hi), (j, -hj)])?;
            let value = (pp - pm - mp + mm) / (4.0 * hi * hj);
            hess[[i, j]] = value;
            hess[[j, i]] = value;
        }
    }
    validate_hessian(&hess, dim)?;
    Ok(hess)
}

/// objective_hessian — Hessian of an [`Objective`] at `x`.
///
/// If the objective provides an analytic gradient, the Hessian is the
/// finite-difference Jacobian of that gradient ([`compute_hessian`]);
/// otherwise it is built from values alone ([`hessian_from_values`]).
///
/// # Errors
/// Propagates objective failures and Hessian validation errors.
pub fn objective_hessian<O: Objective + ?Sized>(objective: &O, x: &Point) -> RefineResult<Hessian> {
    match objective.gradient(x) {
        Ok(g) => {
            validate_grad(&g, x.len())?;
            let closure_err: RefCell<Option<RefineError>> = RefCell::new(None);
            let grad_fn = |p: &Point| -> Grad {
                match objective.gradient(p) {
                    Ok(g) => g,
                    Err(e) => {
                        let mut slot = closure_err.borrow_mut();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        Grad::from_elem(p.len(), f64::NAN)
                    }
                }
            };
            let hess = compute_hessian(&grad_fn, x);
            if let Some(err) = closure_err.take() {
                return Err(err);
            }
            hess
        }
        Err(RefineError::GradientNotImplemented) => {
            hessian_from_values(&|p: &Point| objective.value(p), x)
        }
        Err(e) => Err(e),
    }
}

// ---- Helper methods ----

/// symmetrize_hess — replace each off-diagonal pair by its average, in place.
fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}
