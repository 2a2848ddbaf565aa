//! Public API surface for local refinement.
//!
//! - [`Objective`]: trait callers implement for the function being refined.
//! - [`FnObjective`] / [`FnObjectiveWithGradient`]: closure wrappers.
//! - [`RefineOptions`] and [`Tolerances`]: configuration for a refinement.
//! - [`Method`] and [`LineSearcher`]: the closed set of optimizer choices.
//!
//! Convention: the objective is *minimized* as-is. If an analytic gradient
//! is provided it must be `∇f(x)`; otherwise finite differences are used.
use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::{
        types::{Cost, DEFAULT_SIMPLEX_SCALE, Grad, Point},
        validation::{verify_tol_f, verify_tol_grad, verify_tol_x},
    },
};
use std::{str::FromStr, time::Duration};

/// User-implemented objective `f: ℝⁿ → ℝ`.
///
/// Required:
/// - `value(&Point) -> RefineResult<Cost>`: evaluate `f(x)`. Domain failures
///   should be reported as [`RefineError::ObjectiveFailed`] (see
///   [`RefineError::objective`]), not panics.
///
/// Optional:
/// - `gradient(&Point) -> RefineResult<Grad>`: analytic `∇f(x)`. When absent,
///   robust finite differences are used automatically.
///
/// Implementations are called concurrently from batch workers and from the
/// watchdog's worker thread, hence the `Send + Sync` bound.
pub trait Objective: Send + Sync {
    fn value(&self, x: &Point) -> RefineResult<Cost>;

    fn gradient(&self, _x: &Point) -> RefineResult<Grad> {
        Err(RefineError::GradientNotImplemented)
    }
}

/// Wraps a plain closure `Fn(&Point) -> f64` as an [`Objective`].
#[derive(Debug, Clone)]
pub struct FnObjective<F> {
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&Point) -> f64 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Attach an analytic gradient.
    pub fn with_gradient<G>(self, g: G) -> FnObjectiveWithGradient<F, G>
    where
        G: Fn(&Point) -> Grad + Send + Sync,
    {
        FnObjectiveWithGradient { f: self.f, g }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&Point) -> f64 + Send + Sync,
{
    fn value(&self, x: &Point) -> RefineResult<Cost> {
        Ok((self.f)(x))
    }
}

/// Closure objective with an analytic gradient.
#[derive(Debug, Clone)]
pub struct FnObjectiveWithGradient<F, G> {
    f: F,
    g: G,
}

impl<F, G> Objective for FnObjectiveWithGradient<F, G>
where
    F: Fn(&Point) -> f64 + Send + Sync,
    G: Fn(&Point) -> Grad + Send + Sync,
{
    fn value(&self, x: &Point) -> RefineResult<Cost> {
        Ok((self.f)(x))
    }

    fn gradient(&self, x: &Point) -> RefineResult<Grad> {
        Ok((self.g)(x))
    }
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing accepts case-insensitive `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(RefineError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Local optimizer strategy.
///
/// - `GradientBased`: L-BFGS with the chosen line search; uses the analytic
///   gradient when available, finite differences otherwise.
/// - `DerivativeFree`: Nelder–Mead simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    GradientBased { line_searcher: LineSearcher },
    DerivativeFree,
}

impl Method {
    pub fn is_derivative_free(&self) -> bool {
        matches!(self, Method::DerivativeFree)
    }
}

impl FromStr for Method {
    type Err = RefineError;

    /// Accepts `"lbfgs"`, `"gradient"` (More–Thuente line search),
    /// `"lbfgs-hagerzhang"`, and `"neldermead"` / `"nelder-mead"` /
    /// `"derivative-free"`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lbfgs" | "gradient" => {
                Ok(Method::GradientBased { line_searcher: LineSearcher::MoreThuente })
            }
            "lbfgs-hagerzhang" => {
                Ok(Method::GradientBased { line_searcher: LineSearcher::HagerZhang })
            }
            "neldermead" | "nelder-mead" | "derivative-free" => Ok(Method::DerivativeFree),
            _ => Err(RefineError::InvalidMethod {
                name: s.to_string(),
                reason: "Valid options are 'lbfgs', 'lbfgs-hagerzhang' or 'neldermead'.",
            }),
        }
    }
}

/// Numerical tolerances and iteration limits.
///
/// - `f_tol`: function-value tolerance. For L-BFGS, the absolute change in
///   `f` between iterations; for Nelder–Mead, the spread (standard
///   deviation) of the simplex values.
/// - `x_tol`: parameter-change tolerance `‖x_k − x_{k−1}‖`.
/// - `g_tol`: gradient-norm tolerance `‖∇f‖`.
/// - `max_iter`: hard cap on iterations.
///
/// Any field can be `None` but at least one must be provided.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub f_tol: Option<f64>,
    pub x_tol: Option<f64>,
    pub g_tol: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`RefineError::NoTolerancesProvided`] if all four are `None`.
    /// - `InvalidTolF` / `InvalidTolX` / `InvalidTolGrad` for non-finite or
    ///   non-positive tolerances.
    /// - [`RefineError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        f_tol: Option<f64>, x_tol: Option<f64>, g_tol: Option<f64>, max_iter: Option<usize>,
    ) -> RefineResult<Self> {
        if f_tol.is_none() && x_tol.is_none() && g_tol.is_none() && max_iter.is_none() {
            return Err(RefineError::NoTolerancesProvided);
        }
        verify_tol_f(f_tol)?;
        verify_tol_x(x_tol)?;
        verify_tol_grad(g_tol)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(RefineError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { f_tol, x_tol, g_tol, max_iter })
    }
}

impl Default for Tolerances {
    /// `f_tol = 1e-12`, `x_tol = 1e-10`, `g_tol = 1e-8`, `max_iter = 1000`.
    fn default() -> Self {
        Self { f_tol: Some(1e-12), x_tol: Some(1e-10), g_tol: Some(1e-8), max_iter: Some(1000) }
    }
}

/// Per-point refinement configuration.
///
/// Fields:
/// - `method`: optimizer strategy.
/// - `tols`: stopping criteria.
/// - `timeout`: hard wall-clock budget per point; `None` disables it.
/// - `robust_mode`: when `true`, objective failures and panics are recorded
///   on the result (value `+∞`) instead of being returned as errors.
/// - `lbfgs_mem`: L-BFGS history size; `None` uses
///   [`DEFAULT_LBFGS_MEM`](crate::refinement::local_optimizer::types::DEFAULT_LBFGS_MEM).
/// - `simplex_scale`: relative size of the initial Nelder–Mead simplex.
/// - `verbose`: attach an Argmin progress observer (`obs_slog` feature).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefineOptions {
    pub method: Method,
    pub tols: Tolerances,
    pub timeout: Option<Duration>,
    pub robust_mode: bool,
    pub lbfgs_mem: Option<usize>,
    pub simplex_scale: f64,
    pub verbose: bool,
}

impl RefineOptions {
    /// Create validated refinement options.
    ///
    /// # Errors
    /// - [`RefineError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    /// - [`RefineError::InvalidTimeout`] for a zero-length timeout.
    pub fn new(
        method: Method, tols: Tolerances, timeout: Option<Duration>, robust_mode: bool,
        lbfgs_mem: Option<usize>,
    ) -> RefineResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(RefineError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        if let Some(t) = timeout {
            if t.is_zero() {
                return Err(RefineError::InvalidTimeout {
                    reason: "Timeout must be strictly positive.",
                });
            }
        }
        Ok(Self {
            method,
            tols,
            timeout,
            robust_mode,
            lbfgs_mem,
            simplex_scale: DEFAULT_SIMPLEX_SCALE,
            verbose: false,
        })
    }

    /// Override the relative size of the initial simplex.
    ///
    /// # Errors
    /// [`RefineError::InvalidSimplexScale`] unless finite and > 0.
    pub fn with_simplex_scale(mut self, scale: f64) -> RefineResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RefineError::InvalidSimplexScale {
                value: scale,
                reason: "Simplex scale must be finite and positive.",
            });
        }
        self.simplex_scale = scale;
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for RefineOptions {
    /// Derivative-free, default tolerances, 30 s per point, robust mode on.
    fn default() -> Self {
        Self {
            method: Method::DerivativeFree,
            tols: Tolerances::default(),
            timeout: Some(Duration::from_secs(30)),
            robust_mode: true,
            lbfgs_mem: None,
            simplex_scale: DEFAULT_SIMPLEX_SCALE,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Parsing of `LineSearcher` and `Method`.
    // - Validation rules of `Tolerances::new` and `RefineOptions::new`.
    // - Closure objectives with and without analytic gradients.
    // -------------------------------------------------------------------------

    #[test]
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("MORETHUENTE".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert_eq!("hagerzhang".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert!(matches!(
            "armijo".parse::<LineSearcher>(),
            Err(RefineError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    fn method_parses_known_names() {
        assert_eq!("Nelder-Mead".parse::<Method>(), Ok(Method::DerivativeFree));
        assert_eq!(
            "lbfgs".parse::<Method>(),
            Ok(Method::GradientBased { line_searcher: LineSearcher::MoreThuente })
        );
        assert!(matches!("newton".parse::<Method>(), Err(RefineError::InvalidMethod { .. })));
    }

    #[test]
    // Purpose
    // -------
    // At least one stopping rule must exist, otherwise a run could never end
    // except by timeout.
    fn tolerances_require_at_least_one_rule() {
        assert_eq!(Tolerances::new(None, None, None, None), Err(RefineError::NoTolerancesProvided));
        assert!(Tolerances::new(None, None, None, Some(10)).is_ok());
    }

    #[test]
    fn tolerances_reject_zero_max_iter() {
        assert!(matches!(
            Tolerances::new(Some(1e-8), None, None, Some(0)),
            Err(RefineError::InvalidMaxIter { .. })
        ));
    }

    #[test]
    fn refine_options_reject_zero_memory_and_zero_timeout() {
        let tols = Tolerances::default();
        assert!(matches!(
            RefineOptions::new(Method::DerivativeFree, tols, None, true, Some(0)),
            Err(RefineError::InvalidLBFGSMem { .. })
        ));
        assert!(matches!(
            RefineOptions::new(Method::DerivativeFree, tols, Some(Duration::ZERO), true, None),
            Err(RefineError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn refine_options_reject_bad_simplex_scale() {
        let opts = RefineOptions::default();
        assert!(opts.clone().with_simplex_scale(0.1).is_ok());
        assert!(matches!(
            opts.with_simplex_scale(f64::NAN),
            Err(RefineError::InvalidSimplexScale { .. })
        ));
    }

    #[test]
    fn default_options_are_derivative_free_and_robust() {
        let opts = RefineOptions::default();
        assert!(opts.method.is_derivative_free());
        assert!(opts.robust_mode);
        assert_eq!(opts.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    // Purpose
    // -------
    // A bare closure objective defers to finite differences by reporting
    // `GradientNotImplemented`; attaching a gradient overrides that.
    fn closure_objectives_expose_optional_gradient() {
        // Arrange
        let plain = FnObjective::new(|x: &Point| x.dot(x));
        let with_grad = FnObjective::new(|x: &Point| x.dot(x)).with_gradient(|x: &Point| 2.0 * x);
        let x = array![1.0, -2.0];

        // Act & Assert
        assert_eq!(plain.value(&x), Ok(5.0));
        assert_eq!(plain.gradient(&x), Err(RefineError::GradientNotImplemented));
        assert_eq!(with_grad.gradient(&x), Ok(array![2.0, -4.0]));
    }
}
