//! analysis::hessian — classify critical points from Hessian spectra.
//!
//! Purpose
//! -------
//! Label a refined point as a minimum, maximum, saddle or degenerate point
//! from the eigenvalues of its Hessian. Eigenvalues may be supplied
//! directly (e.g. from an upstream search), derived from a Hessian matrix,
//! or computed at a point by finite differences of the objective.
//!
//! Key behaviors
//! -------------
//! - [`HessianClassifier::kind`] applies the labelling rule to a slice of
//!   eigenvalues.
//! - [`symmetric_eigenvalues`] copies an `ndarray` Hessian into a
//!   `nalgebra::DMatrix` (`fill_dmatrix`) and runs `symmetric_eigen`,
//!   returning eigenvalues in ascending order.
//! - [`HessianClassifier::classify_point`] builds the Hessian with
//!   [`objective_hessian`] and classifies it.
//!
//! Invariants & assumptions
//! ------------------------
//! - An eigenvalue is "near zero" when `|λ| ≤ max(rel_tol · max|λ|, abs_tol)`.
//!   Any near-zero eigenvalue makes the point degenerate, regardless of the
//!   signs of the others; this check runs before the sign tests.
//! - Empty or non-finite eigenvalue vectors are rejected, never labelled.
//!
//! Conventions
//! -----------
//! - Labels render as `"minimum"`, `"maximum"`, `"saddle"` and
//!   `"degenerate"`.
use crate::{
    analysis::errors::{AnalysisError, AnalysisResult, verify_positive},
    refinement::local_optimizer::{
        finite_diff::objective_hessian,
        traits::Objective,
        types::{Hessian, Point},
    },
};
use nalgebra::DMatrix;
use ndarray::Array1;
use std::fmt;

/// Kind of critical point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HessianKind {
    Minimum,
    Maximum,
    Saddle,
    Degenerate,
}

impl fmt::Display for HessianKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HessianKind::Minimum => "minimum",
            HessianKind::Maximum => "maximum",
            HessianKind::Saddle => "saddle",
            HessianKind::Degenerate => "degenerate",
        };
        f.write_str(label)
    }
}

/// Eigenvalues with their label.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HessianClassification {
    pub eigenvalues: Array1<f64>,
    pub kind: HessianKind,
}

impl HessianClassification {
    /// Smallest eigenvalue.
    pub fn min_eigenvalue(&self) -> Option<f64> {
        self.eigenvalues.iter().copied().min_by(f64::total_cmp)
    }
}

/// Near-zero thresholds for eigenvalues.
///
/// - `rel_tol`: relative to the largest eigenvalue magnitude.
/// - `abs_tol`: absolute floor, so an all-zero spectrum is degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassifierOptions {
    pub rel_tol: f64,
    pub abs_tol: f64,
}

impl ClassifierOptions {
    /// # Errors
    /// [`AnalysisError::InvalidTolerance`] unless both are finite and > 0.
    pub fn new(rel_tol: f64, abs_tol: f64) -> AnalysisResult<Self> {
        verify_positive("relative eigenvalue tolerance", rel_tol)?;
        verify_positive("absolute eigenvalue tolerance", abs_tol)?;
        Ok(Self { rel_tol, abs_tol })
    }
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self { rel_tol: 1e-6, abs_tol: 1e-12 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HessianClassifier {
    opts: ClassifierOptions,
}

impl HessianClassifier {
    pub fn new(opts: ClassifierOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &ClassifierOptions {
        &self.opts
    }

    /// kind — label a point from its Hessian eigenvalues.
    ///
    /// Rule
    /// ----
    /// 1. Any `|λ| ≤ max(rel_tol · max|λ|, abs_tol)` → `Degenerate`.
    /// 2. All `λ > 0` → `Minimum`.
    /// 3. All `λ < 0` → `Maximum`.
    /// 4. Otherwise → `Saddle`.
    ///
    /// Errors
    /// ------
    /// - [`AnalysisError::EmptyEigenvalues`] for an empty slice.
    /// - [`AnalysisError::InvalidEigenvalue`] for NaN or infinite entries.
    pub fn kind(&self, eigenvalues: &[f64]) -> AnalysisResult<HessianKind> {
        if eigenvalues.is_empty() {
            return Err(AnalysisError::EmptyEigenvalues);
        }
        if let Some((index, &value)) = eigenvalues.iter().enumerate().find(|(_, v)| !v.is_finite())
        {
            return Err(AnalysisError::InvalidEigenvalue { index, value });
        }
        let scale = eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let threshold = (self.opts.rel_tol * scale).max(self.opts.abs_tol);
        if eigenvalues.iter().any(|v| v.abs() <= threshold) {
            return Ok(HessianKind::Degenerate);
        }
        if eigenvalues.iter().all(|&v| v > 0.0) {
            Ok(HessianKind::Minimum)
        } else if eigenvalues.iter().all(|&v| v < 0.0) {
            Ok(HessianKind::Maximum)
        } else {
            Ok(HessianKind::Saddle)
        }
    }

    /// Classify a supplied eigenvalue vector.
    ///
    /// # Errors
    /// Same as [`HessianClassifier::kind`].
    pub fn classify(&self, eigenvalues: &Array1<f64>) -> AnalysisResult<HessianClassification> {
        let kind = self.kind(&eigenvalues.to_vec())?;
        Ok(HessianClassification { eigenvalues: eigenvalues.clone(), kind })
    }

    /// Classify a symmetric Hessian matrix.
    ///
    /// # Errors
    /// Shape and finiteness errors from [`symmetric_eigenvalues`], then those
    /// of [`HessianClassifier::kind`].
    pub fn classify_matrix(&self, hessian: &Hessian) -> AnalysisResult<HessianClassification> {
        let eigenvalues = symmetric_eigenvalues(hessian)?;
        self.classify(&eigenvalues)
    }

    /// Build the Hessian of `objective` at `x` and classify it.
    ///
    /// # Errors
    /// Objective and finite-difference failures (wrapped as
    /// [`AnalysisError::Refine`]) plus classification errors.
    pub fn classify_point<O: Objective + ?Sized>(
        &self, objective: &O, x: &Point,
    ) -> AnalysisResult<(Hessian, HessianClassification)> {
        let hessian = objective_hessian(objective, x)?;
        let classification = self.classify_matrix(&hessian)?;
        Ok((hessian, classification))
    }
}

/// symmetric_eigenvalues — eigenvalues of a symmetric `n × n` matrix.
///
/// Returns the eigenvalues sorted ascending.
///
/// Errors
/// ------
/// - [`AnalysisError::HessianNotSquare`] for non-square input.
/// - [`AnalysisError::EmptyEigenvalues`] for a `0 × 0` matrix.
/// - [`AnalysisError::NonFiniteValue`] if any entry is NaN or infinite.
pub fn symmetric_eigenvalues(hessian: &Hessian) -> AnalysisResult<Array1<f64>> {
    let (rows, cols) = hessian.dim();
    if rows != cols {
        return Err(AnalysisError::HessianNotSquare { rows, cols });
    }
    if rows == 0 {
        return Err(AnalysisError::EmptyEigenvalues);
    }
    if let Some(&value) = hessian.iter().find(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFiniteValue { what: "Hessian entry", value });
    }
    let mut hess_nalg = DMatrix::<f64>::zeros(rows, cols);
    fill_dmatrix(hessian, &mut hess_nalg);
    let mut eigenvalues: Vec<f64> = hess_nalg.symmetric_eigen().eigenvalues.iter().copied().collect();
    eigenvalues.sort_by(f64::total_cmp);
    Ok(Array1::from(eigenvalues))
}

// ---- Helper methods ----

/// fill_dmatrix — copy an `ndarray` Hessian into a `nalgebra::DMatrix`.
///
/// Column-major writes, matching `DMatrix` storage. Shapes must agree.
fn fill_dmatrix(hessian: &Hessian, hess_nalg: &mut DMatrix<f64>) {
    let n = hessian.ncols();
    for j in 0..n {
        for i in j..n {
            if j == i {
                hess_nalg[(i, i)] = hessian[[i, i]];
            } else {
                hess_nalg[(i, j)] = hessian[[i, j]];
                hess_nalg[(j, i)] = hessian[[j, i]];
            }
        }
    }
}
