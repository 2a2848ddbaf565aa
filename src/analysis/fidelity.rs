//! analysis::fidelity — does a candidate sit in the basin of its refinement?
//!
//! Purpose
//! -------
//! Decide whether a candidate `x*` from the coarse search and its locally
//! refined counterpart `x_min` belong to the same basin of attraction, and
//! attach a confidence to that verdict.
//!
//! Key behaviors
//! -------------
//! - Criterion 1, objective proximity (always evaluated): relative
//!   difference `|f* − f_min| / |f_min| < tolerance`, except when
//!   `|f_min| < abs_tolerance`, where the relative difference is meaningless
//!   and the check becomes `|f*| < tolerance` with metric `|f* − f_min|`.
//! - Criterion 2, Hessian basin radius (only for a supplied, positive
//!   definite Hessian): quadratic-model radius
//!   `r = sqrt(2 · rise / λ_min)` with `rise = threshold_factor · |f_min|`,
//!   or `rise = tolerance` when `|f_min| < abs_tolerance`; then
//!   `metric = ‖x* − x_min‖ / r` and the criterion passes iff `metric < 1`.
//! - Composite: `confidence = passed / evaluated`, same basin iff
//!   `confidence ≥ 0.5`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `x*`, `x_min` and the Hessian must agree in dimension; a mismatch is a
//!   caller bug reported as [`AnalysisError::DimensionMismatch`].
//! - A saddle, maximum or degenerate Hessian is "not assessed": the
//!   sub-result carries `NaN` radius and metric, `is_same_basin = false`,
//!   and it does not count toward the confidence.
use crate::{
    analysis::{
        errors::{AnalysisError, AnalysisResult, verify_positive},
        hessian::{HessianClassifier, HessianKind},
    },
    refinement::local_optimizer::{
        traits::Objective,
        types::{Hessian, Point},
    },
};
use tracing::debug;

pub const OBJECTIVE_PROXIMITY: &str = "objective_proximity";
pub const HESSIAN_BASIN: &str = "hessian_basin";

/// Thresholds for both criteria.
///
/// - `tolerance`: relative objective tolerance (criterion 1), also the
///   absolute rise used near zero (criterion 2).
/// - `abs_tolerance`: `|f_min|` below this counts as zero.
/// - `threshold_factor`: allowed relative rise of `f` across the basin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasinFidelityOptions {
    pub tolerance: f64,
    pub abs_tolerance: f64,
    pub threshold_factor: f64,
}

impl BasinFidelityOptions {
    /// # Errors
    /// `AnalysisError::InvalidTolerance` unless all three are finite and > 0.
    pub fn new(tolerance: f64, abs_tolerance: f64, threshold_factor: f64) -> AnalysisResult<Self> {
        verify_positive("fidelity tolerance", tolerance)?;
        verify_positive("fidelity absolute tolerance", abs_tolerance)?;
        verify_positive("basin threshold factor", threshold_factor)?;
        Ok(Self { tolerance, abs_tolerance, threshold_factor })
    }
}

impl Default for BasinFidelityOptions {
    fn default() -> Self {
        Self { tolerance: 0.05, abs_tolerance: 1e-6, threshold_factor: 0.10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveProximityResult {
    pub is_same_basin: bool,
    pub metric: f64,
    pub f_star: f64,
    pub f_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HessianBasinResult {
    pub is_same_basin: bool,
    /// `distance / basin_radius`; `NaN` when not assessed.
    pub metric: f64,
    pub distance: f64,
    /// `NaN` when not assessed.
    pub basin_radius: f64,
    pub kind: HessianKind,
}

impl HessianBasinResult {
    /// Whether the Hessian allowed a radius estimate.
    pub fn assessed(&self) -> bool {
        self.basin_radius.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Criterion {
    pub name: String,
    pub passed: bool,
    pub metric: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasinFidelityResult {
    pub is_same_basin: bool,
    /// Fraction of evaluated criteria that passed, in `[0, 1]`.
    pub confidence: f64,
    /// Evaluated criteria only.
    pub criteria: Vec<Criterion>,
    pub proximity: ObjectiveProximityResult,
    /// Present whenever a Hessian was supplied, assessed or not.
    pub hessian: Option<HessianBasinResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasinFidelityAssessor {
    opts: BasinFidelityOptions,
    classifier: HessianClassifier,
}

impl BasinFidelityAssessor {
    pub fn new(opts: BasinFidelityOptions) -> Self {
        Self { opts, classifier: HessianClassifier::default() }
    }

    /// Use a non-default classifier for the positive-definiteness check.
    pub fn with_classifier(mut self, classifier: HessianClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn options(&self) -> &BasinFidelityOptions {
        &self.opts
    }

    /// Criterion 1 from already evaluated objective values.
    ///
    /// # Errors
    /// [`AnalysisError::NonFiniteValue`] if either value is NaN or infinite.
    pub fn proximity_from_values(&self, f_star: f64, f_min: f64) -> AnalysisResult<ObjectiveProximityResult> {
        for (what, value) in [("f(x_star)", f_star), ("f(x_min)", f_min)] {
            if !value.is_finite() {
                return Err(AnalysisError::NonFiniteValue { what, value });
            }
        }
        let (is_same_basin, metric) = if self.near_zero(f_min) {
            (f_star.abs() < self.opts.tolerance, (f_star - f_min).abs())
        } else {
            let rel_diff = (f_star - f_min).abs() / f_min.abs();
            (rel_diff < self.opts.tolerance, rel_diff)
        };
        Ok(ObjectiveProximityResult { is_same_basin, metric, f_star, f_min })
    }

    /// objective_proximity — criterion 1 at a pair of points.
    ///
    /// # Errors
    /// - [`AnalysisError::DimensionMismatch`] if the points differ in length.
    /// - Objective failures, and non-finite values.
    pub fn objective_proximity<O: Objective + ?Sized>(
        &self, x_star: &Point, x_min: &Point, objective: &O,
    ) -> AnalysisResult<ObjectiveProximityResult> {
        check_same_dim("candidate and refined point", x_min.len(), x_star.len())?;
        let f_star = objective.value(x_star)?;
        let f_min = objective.value(x_min)?;
        self.proximity_from_values(f_star, f_min)
    }

    /// hessian_basin — criterion 2 given `f(x_min)` and the Hessian there.
    ///
    /// # Errors
    /// - [`AnalysisError::DimensionMismatch`] for mismatched points or a
    ///   Hessian whose size differs from the point dimension.
    /// - [`AnalysisError::HessianNotSquare`] / non-finite Hessian entries.
    pub fn hessian_basin(
        &self, x_star: &Point, x_min: &Point, f_min: f64, hessian: &Hessian,
    ) -> AnalysisResult<HessianBasinResult> {
        let n = x_min.len();
        check_same_dim("candidate and refined point", n, x_star.len())?;
        let (rows, cols) = hessian.dim();
        if rows != cols {
            return Err(AnalysisError::HessianNotSquare { rows, cols });
        }
        check_same_dim("Hessian and refined point", n, rows)?;

        let distance = (x_star - x_min).mapv(|d| d * d).sum().sqrt();
        let classification = self.classifier.classify_matrix(hessian)?;
        let lambda_min = classification.min_eigenvalue();
        let (kind, lambda_min) = match (classification.kind, lambda_min) {
            (HessianKind::Minimum, Some(l)) => (HessianKind::Minimum, l),
            (kind, _) => {
                debug!(kind = %kind, "Hessian basin not assessed");
                return Ok(HessianBasinResult {
                    is_same_basin: false,
                    metric: f64::NAN,
                    distance,
                    basin_radius: f64::NAN,
                    kind,
                });
            }
        };
        let rise = if self.near_zero(f_min) {
            self.opts.tolerance
        } else {
            self.opts.threshold_factor * f_min.abs()
        };
        let basin_radius = (2.0 * rise / lambda_min).sqrt();
        let metric = distance / basin_radius;
        Ok(HessianBasinResult { is_same_basin: metric < 1.0, metric, distance, basin_radius, kind })
    }

    /// assess — composite same-basin verdict.
    ///
    /// Parameters
    /// ----------
    /// - `x_star`: candidate from the coarse search.
    /// - `x_min`: its refined counterpart; same dimension.
    /// - `objective`: evaluated at both points.
    /// - `hessian_min`: optional Hessian at `x_min`.
    ///
    /// # Errors
    /// Dimension mismatches, objective failures and invalid Hessians.
    pub fn assess<O: Objective + ?Sized>(
        &self, x_star: &Point, x_min: &Point, objective: &O, hessian_min: Option<&Hessian>,
    ) -> AnalysisResult<BasinFidelityResult> {
        let proximity = self.objective_proximity(x_star, x_min, objective)?;
        let hessian = hessian_min
            .map(|h| self.hessian_basin(x_star, x_min, proximity.f_min, h))
            .transpose()?;

        let mut criteria = vec![Criterion {
            name: OBJECTIVE_PROXIMITY.to_string(),
            passed: proximity.is_same_basin,
            metric: proximity.metric,
        }];
        if let Some(h) = hessian.as_ref().filter(|h| h.assessed()) {
            criteria.push(Criterion {
                name: HESSIAN_BASIN.to_string(),
                passed: h.is_same_basin,
                metric: h.metric,
            });
        }
        let passed = criteria.iter().filter(|c| c.passed).count();
        let confidence = passed as f64 / criteria.len() as f64;
        Ok(BasinFidelityResult {
            is_same_basin: confidence >= 0.5,
            confidence,
            criteria,
            proximity,
            hessian,
        })
    }

    /// assess_pairs — [`BasinFidelityAssessor::assess`] over paired points.
    ///
    /// `hessians`, when given, must have one entry per pair.
    ///
    /// # Errors
    /// [`AnalysisError::LengthMismatch`] for a Hessian list of the wrong
    /// length. Per-pair failures are returned in place.
    pub fn assess_pairs<O: Objective + ?Sized>(
        &self, pairs: &[(Point, Point)], objective: &O, hessians: Option<&[Hessian]>,
    ) -> AnalysisResult<Vec<AnalysisResult<BasinFidelityResult>>> {
        if let Some(hs) = hessians {
            if hs.len() != pairs.len() {
                return Err(AnalysisError::LengthMismatch {
                    what: "Hessians per pair",
                    expected: pairs.len(),
                    found: hs.len(),
                });
            }
        }
        Ok(pairs
            .iter()
            .enumerate()
            .map(|(i, (x_star, x_min))| {
                self.assess(x_star, x_min, objective, hessians.map(|hs| &hs[i]))
            })
            .collect())
    }

    fn near_zero(&self, f_min: f64) -> bool {
        f_min.abs() < self.opts.abs_tolerance
    }
}

fn check_same_dim(what: &'static str, expected: usize, found: usize) -> AnalysisResult<()> {
    if expected != found {
        return Err(AnalysisError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}
