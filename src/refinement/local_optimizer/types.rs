//! local_optimizer::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the numeric types and Argmin solver aliases used by the
//! refinement engine so that the rest of the crate stays agnostic to
//! `ndarray` and Argmin generics.
//!
//! Conventions
//! -----------
//! - `Point` and `Grad` are column vectors of length `n`, the dimension of
//!   the parameter space; `Hessian` is a dense `n × n` matrix.
//! - `Cost` is the objective value being *minimized*; unlike a likelihood
//!   optimizer there is no sign flip anywhere in this crate.
use argmin::{
    core::IterState,
    solver::{
        linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
        neldermead::NelderMead,
        quasinewton::LBFGS,
    },
};
use ndarray::{Array1, Array2};

/// Point in parameter space.
pub type Point = Array1<f64>;

/// Gradient vector `∇f(x)`, same shape as [`Point`].
pub type Grad = Array1<f64>;

/// Dense Hessian matrix, `n × n` for `n = Point.len()`.
pub type Hessian = Array2<f64>;

/// Scalar objective value.
pub type Cost = f64;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Relative offset used to build the initial Nelder–Mead simplex around a
/// non-zero coordinate.
pub const DEFAULT_SIMPLEX_SCALE: f64 = 0.05;

/// Absolute offset used for coordinates that are exactly zero.
pub const ZERO_COORD_SIMPLEX_STEP: f64 = 0.00025;

pub type HagerZhangLS = HagerZhangLineSearch<Point, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Point, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Point, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Point, Grad, Cost>;

/// Derivative-free simplex solver.
pub type Simplex = NelderMead<Point, Cost>;

/// Argmin state for gradient-based solvers.
pub type GradState = IterState<Point, Grad, (), (), (), Cost>;

/// Argmin state for derivative-free solvers.
pub type SimplexState = IterState<Point, (), (), (), (), Cost>;
