//! refinement — local polishing of candidate critical points.
//!
//! Purpose
//! -------
//! Group the local optimizer and its error surface. Candidates arrive from a
//! coarse search (grid, polynomial system solve, sampling) and leave as
//! [`local_optimizer::RefinementResult`]s.
//!
//! Testing notes
//! -------------
//! - `errors`: conversions from Argmin errors back into `RefineError`.
//! - `local_optimizer`: solver wiring, timeouts, and diagnostics.

pub mod errors;
pub mod local_optimizer;

pub mod prelude {
    pub use super::errors::{RefineError, RefineResult};
    pub use super::local_optimizer::prelude::*;
}
