//! local_optimizer — argmin-powered local refinement of candidate points.
//!
//! Purpose
//! -------
//! Take a candidate critical point produced by a coarse search and polish it
//! to a nearby local minimum of a user objective, under a hard per-point
//! wall-clock budget, returning a [`RefinementResult`] with full diagnostics.
//!
//! Key behaviors
//! -------------
//! - Bridge user [`Objective`]s into Argmin via [`adapter::ArgMinAdapter`],
//!   counting evaluations and tracking the best point seen.
//! - Select a [`strategy::LocalOptimizer`] from [`Method`]: L-BFGS with a
//!   More–Thuente or Hager–Zhang line search, or Nelder–Mead.
//! - Enforce timeouts with [`watchdog`]: the run executes on a worker thread
//!   and is abandoned (reporting its best point) when the budget expires.
//! - Derive per-criterion flags and a single [`ConvergenceReason`] from the
//!   terminal solver state in [`diagnostics`].
//! - Provide finite-difference gradients and Hessians in [`finite_diff`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The objective is minimized as-is; there is no sign convention to track.
//! - Objective implementations report domain failures as `RefineError`
//!   values. Panics are caught at the worker boundary, never propagated.
//! - Configuration types ([`Tolerances`], [`RefineOptions`]) validate on
//!   construction.
//!
//! Conventions
//! -----------
//! - Points and gradients are `Array1<f64>` ([`Point`], [`Grad`]); Hessians
//!   are dense `Array2<f64>`.
//! - Errors bubble up as `RefineResult<T>`; with `robust_mode` enabled the
//!   entry point records failures on the result instead.
//!
//! Downstream usage
//! ----------------
//! - Callers build a [`Refiner`] once and call [`Refiner::refine`] per point,
//!   or use the batch orchestrator to fan out over many candidates.
//! - The analysis layer reuses [`finite_diff`] for gradient validation and
//!   Hessian classification.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover adapter accounting, solver wiring, flag
//!   extraction, timeout and panic handling, and FD accuracy on quadratics.
//! - Integration tests refine a full grid of candidates of a quartic
//!   double-well objective.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod diagnostics;
pub mod finite_diff;
pub mod result;
pub mod run;
pub mod strategy;
pub mod traits;
pub mod types;
pub mod validation;
pub mod watchdog;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::{Refiner, refine};
pub use self::diagnostics::{ConvergenceFlags, ConvergenceReason};
pub use self::result::RefinementResult;
pub use self::traits::{
    FnObjective, FnObjectiveWithGradient, LineSearcher, Method, Objective, RefineOptions,
    Tolerances,
};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, Grad, Hessian, Point};

pub mod prelude {
    pub use super::api::{Refiner, refine};
    pub use super::diagnostics::{ConvergenceFlags, ConvergenceReason};
    pub use super::result::RefinementResult;
    pub use super::traits::{FnObjective, Method, Objective, RefineOptions, Tolerances};
    pub use super::types::{Grad, Hessian, Point};
}
