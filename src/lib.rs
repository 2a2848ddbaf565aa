//! critpoint_refine — refinement and verification of candidate critical points.
//!
//! Purpose
//! -------
//! Take approximate critical points of a smooth objective `f: Rⁿ → R`
//! (typically produced by a grid scan or a polynomial-system solve) and turn
//! them into verified findings: polished coordinates, confirmed stationarity,
//! curvature labels, deduplicated minima, and a same-basin verdict linking
//! each candidate to its refinement.
//!
//! Key behaviors
//! -------------
//! - [`refinement`]: a per-candidate local optimizer (L-BFGS or Nelder–Mead
//!   on Argmin) under a wall-clock watchdog, reporting diagnostics and a
//!   convergence reason.
//! - [`analysis`]: gradient validation, Hessian eigenvalue classification,
//!   distance-based clustering of minima, and basin fidelity assessment.
//! - [`batch`]: rayon-parallel orchestration over candidate sets plus
//!   summary statistics.
//!
//! Invariants & assumptions
//! ------------------------
//! - Points are `ndarray::Array1<f64>`; all points in one call share a
//!   dimension.
//! - Objectives are pure and `Send + Sync`; they may be evaluated from
//!   several threads at once.
//! - A timed-out refinement reports the best point evaluated before the
//!   deadline, never one worse than the start.
//!
//! Conventions
//! -----------
//! - Every public operation returns a `Result` over a module error enum
//!   ([`refinement::errors::RefineError`] or
//!   [`analysis::errors::AnalysisError`]); panics in user objectives are
//!   caught and reported.
//! - Diagnostics go through `tracing`; install a subscriber to see them.
//! - With the `serde` feature, result and option types serialize.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module.
//! - `tests/` holds end-to-end runs on a 4D quartic double-well and
//!   regression checks for the analysis components.

pub mod analysis;
pub mod batch;
pub mod refinement;

pub mod prelude {
    pub use crate::analysis::prelude::*;
    pub use crate::batch::prelude::*;
    pub use crate::refinement::prelude::*;
}
