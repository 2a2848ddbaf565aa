//! analysis — post-refinement checks on refined points.
//!
//! Purpose
//! -------
//! Turn a pile of refined points into trustworthy findings: confirm they
//! are stationary ([`gradient`]), label them by curvature ([`hessian`]),
//! collapse duplicates ([`clustering`]), and verify that each candidate and
//! its refinement share a basin ([`fidelity`]).
//!
//! Conventions
//! -----------
//! - Each component takes an explicit options value at construction; there
//!   is no shared or global state.
//! - Failures are [`errors::AnalysisError`]; objective errors are wrapped.
//! - "Not assessed" outcomes are explicit: `Option` for absent values, and
//!   `NaN` radius/metric only where a basin estimate is undefined.

pub mod clustering;
pub mod errors;
pub mod fidelity;
pub mod gradient;
pub mod hessian;

pub use self::clustering::{ClusterAssignment, DistinctMinimaClusterer, ScoredPoint};
pub use self::errors::{AnalysisError, AnalysisResult};
pub use self::fidelity::{BasinFidelityAssessor, BasinFidelityOptions, BasinFidelityResult};
pub use self::gradient::{GradientMethod, GradientValidation, GradientValidator, GradientValidatorOptions};
pub use self::hessian::{ClassifierOptions, HessianClassification, HessianClassifier, HessianKind};

pub mod prelude {
    pub use super::clustering::{ClusterAssignment, DistinctMinimaClusterer, ScoredPoint};
    pub use super::errors::{AnalysisError, AnalysisResult};
    pub use super::fidelity::{BasinFidelityAssessor, BasinFidelityOptions, BasinFidelityResult};
    pub use super::gradient::{GradientValidation, GradientValidator, GradientValidatorOptions};
    pub use super::hessian::{HessianClassifier, HessianKind};
}
