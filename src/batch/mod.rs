//! batch — parallel refinement of many candidates plus aggregate reporting.
//!
//! Purpose
//! -------
//! Drive the refiner and the post-refinement checks over a whole candidate
//! set and condense the outcome into per-point records and a summary.
//!
//! Key behaviors
//! -------------
//! - [`orchestrator`]: rayon-parallel refinement with per-point timeouts,
//!   gradient validation, optional fidelity assessment, and a progress
//!   counter.
//! - [`summary`]: flat comparison records and batch statistics (convergence
//!   rate, reason histogram, call counts, timing, gradient quality).
//!
//! Invariants & assumptions
//! ------------------------
//! - Results are reported in input order regardless of scheduling.
//! - Candidates are independent; nothing is shared between them except the
//!   objective, which must be `Send + Sync`.

pub mod orchestrator;
pub mod summary;

pub use self::orchestrator::{BatchOptions, BatchOrchestrator, BatchReport, Progress};
pub use self::summary::{BatchSummary, ComparisonRecord, GradientStats, Stats, TimingStats};

pub mod prelude {
    pub use super::orchestrator::{BatchOptions, BatchOrchestrator, BatchReport};
    pub use super::summary::{BatchSummary, ComparisonRecord};
}
