//! analysis::errors — error surface for post-refinement analysis.
//!
//! Covers Hessian classification, clustering of minima, gradient validation
//! and basin-fidelity assessment. Objective failures met while analysing
//! are wrapped from [`RefineError`] so callers see one error type here.
use crate::refinement::errors::RefineError;
use thiserror::Error;

/// Result alias for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    // ---- Input validation ----
    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    #[error("Length mismatch in {what}: expected {expected} entries, found {found}")]
    LengthMismatch { what: &'static str, expected: usize, found: usize },

    #[error("Hessian must be square, found {rows}x{cols}")]
    HessianNotSquare { rows: usize, cols: usize },

    #[error("Non-finite {what}: {value}")]
    NonFiniteValue { what: &'static str, value: f64 },

    #[error("Non-finite coordinate {index} of point {point}: {value}")]
    NonFiniteCoordinate { point: usize, index: usize, value: f64 },

    // ---- Eigenvalues ----
    #[error("Eigenvalue vector is empty")]
    EmptyEigenvalues,

    #[error("Invalid eigenvalue at index {index}: {value}")]
    InvalidEigenvalue { index: usize, value: f64 },

    // ---- Options ----
    #[error("Invalid distance threshold {value}: {reason}")]
    InvalidThreshold { value: f64, reason: &'static str },

    #[error("Invalid {name} {value}: {reason}")]
    InvalidTolerance { name: &'static str, value: f64, reason: &'static str },

    // ---- Objective ----
    #[error(transparent)]
    Refine(#[from] RefineError),
}

/// Validate that a tolerance is finite and strictly positive.
pub(crate) fn verify_positive(name: &'static str, value: f64) -> AnalysisResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AnalysisError::InvalidTolerance {
            name,
            value,
            reason: "Tolerance must be finite and positive.",
        });
    }
    Ok(())
}
