//! refinement::errors — unified error surface for local refinement.
//!
//! Purpose
//! -------
//! Collect every configuration, validation, objective and backend failure
//! that can occur while refining a candidate critical point into a single
//! enum ([`RefineError`]) with a shared result alias ([`RefineResult`]).
//!
//! Conventions
//! -----------
//! - Struct variants carry the offending value plus a short static reason so
//!   that messages are actionable without extra context.
//! - Raw `argmin::core::Error` values never cross module boundaries; they are
//!   converted via `From<Error>`, which first recovers errors raised by this
//!   crate's own adapter and only then maps Argmin's native variants.
//! - `DeadlineExceeded` is internal plumbing for the wall-clock watchdog; the
//!   public `refine` entry point converts it into a timed-out result.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Crate-wide result alias for refinement operations.
pub type RefineResult<T> = Result<T, RefineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefineError {
    // ---- Gradient ----
    /// Implies that finite differences should be used.
    #[error("Analytic gradient not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- Options ----
    #[error("Invalid function tolerance {tol}: {reason}")]
    InvalidTolF { tol: f64, reason: &'static str },

    #[error("Invalid parameter tolerance {tol}: {reason}")]
    InvalidTolX { tol: f64, reason: &'static str },

    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    #[error("Invalid optimization method '{name}': {reason}")]
    InvalidMethod { name: String, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    #[error("Invalid initial simplex scale {value}: {reason}")]
    InvalidSimplexScale { value: f64, reason: &'static str },

    #[error("Invalid timeout: {reason}")]
    InvalidTimeout { reason: &'static str },

    // ---- Inputs ----
    #[error("Starting point must contain at least one coordinate")]
    EmptyStartPoint,

    #[error("Invalid starting point at index {index}: {value}: {reason}")]
    InvalidStartPoint { index: usize, value: f64, reason: &'static str },

    // ---- Objective ----
    #[error("Non-finite objective value: {value}")]
    NonFiniteCost { value: f64 },

    #[error("Objective evaluation failed: {text}")]
    ObjectiveFailed { text: String },

    #[error("Objective panicked: {text}")]
    ObjectivePanicked { text: String },

    #[error("Wall-clock deadline exceeded")]
    DeadlineExceeded,

    // ---- Optimizer outcome ----
    #[error("Optimizer returned no best parameter")]
    MissingBestParam,

    #[error("Invalid refined coordinate at index {index}: {value}: {reason}")]
    InvalidBestParam { index: usize, value: f64, reason: &'static str },

    // ---- Finite differences ----
    #[error("Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}")]
    HessianDimMismatch { expected: usize, found: (usize, usize) },

    #[error("Invalid Hessian at ({row}, {col}): {value}, must be finite")]
    InvalidHessian { row: usize, col: usize, value: f64 },

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl RefineError {
    /// Convenience constructor for objective implementations reporting a
    /// domain failure.
    pub fn objective(text: impl Into<String>) -> Self {
        RefineError::ObjectiveFailed { text: text.into() }
    }
}

impl From<Error> for RefineError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<RefineError>() {
            Ok(own) => return own,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => RefineError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => RefineError::NotImplemented { text },
                ArgminError::NotInitialized { text } => RefineError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => RefineError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => {
                    RefineError::CheckPointNotFound { text }
                }
                ArgminError::PotentialBug { text } => RefineError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => RefineError::ImpossibleError { text },
                _ => RefineError::UnknownError,
            },
            Err(err) => RefineError::BackendError { text: err.to_string() },
        }
    }
}
