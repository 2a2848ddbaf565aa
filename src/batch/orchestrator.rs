//! batch::orchestrator — refine and validate many candidates in parallel.
//!
//! Purpose
//! -------
//! Apply the refiner, the gradient validator and (on request) the basin
//! fidelity assessor across a batch of independent candidates.
//!
//! Key behaviors
//! -------------
//! - Candidates are refined on a rayon pool (the global one, or a dedicated
//!   pool of `workers` threads). Each point carries its own wall-clock
//!   budget; a timed-out or failed point never cancels its siblings.
//! - Output order always matches input order, whatever the completion
//!   order or worker count.
//! - A shared [`Progress`] counter advances as points finish. It is for
//!   observation only.
//! - With `robust_mode` off, the first failing candidate in input order is
//!   returned as the batch error after all points have run.
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::{
    analysis::{
        errors::{AnalysisError, AnalysisResult},
        fidelity::{BasinFidelityAssessor, BasinFidelityOptions, BasinFidelityResult},
        gradient::{GradientValidation, GradientValidator, GradientValidatorOptions},
    },
    batch::summary::{BatchSummary, ComparisonRecord},
    refinement::{
        errors::{RefineError, RefineResult},
        local_optimizer::{
            api::Refiner,
            result::RefinementResult,
            traits::{Objective, RefineOptions},
            types::{Hessian, Point},
        },
    },
};

/// Batch-level configuration.
///
/// - `workers`: size of a dedicated rayon pool; `None` uses the global pool.
/// - `gradient`: options for post-refinement gradient validation.
/// - `fidelity`: options for [`BatchOrchestrator::assess_fidelity`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchOptions {
    pub workers: Option<usize>,
    pub gradient: GradientValidatorOptions,
    pub fidelity: BasinFidelityOptions,
}

impl BatchOptions {
    /// # Errors
    /// [`RefineError::InvalidParameter`] for `workers == Some(0)`.
    pub fn new(
        workers: Option<usize>, gradient: GradientValidatorOptions, fidelity: BasinFidelityOptions,
    ) -> RefineResult<Self> {
        if workers == Some(0) {
            return Err(RefineError::InvalidParameter {
                text: "worker count must be greater than zero".to_string(),
            });
        }
        Ok(Self { workers, gradient, fidelity })
    }

    /// Defaults with the gradient tolerance tied to the refinement's `f_tol`.
    pub fn from_refine_options(opts: &RefineOptions) -> Self {
        Self { gradient: GradientValidatorOptions::from_refine_options(opts), ..Self::default() }
    }
}

/// Monotone completion counter shared with observers.
#[derive(Debug, Default)]
pub struct Progress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    fn start(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Everything a batch run produces, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub results: Vec<RefinementResult>,
    pub records: Vec<ComparisonRecord>,
    pub gradient: GradientValidation,
    pub summary: BatchSummary,
}

#[derive(Debug)]
pub struct BatchOrchestrator {
    refiner: Refiner,
    opts: BatchOptions,
    progress: Arc<Progress>,
}

impl BatchOrchestrator {
    pub fn new(refine: RefineOptions, opts: BatchOptions) -> Self {
        Self { refiner: Refiner::new(refine), opts, progress: Arc::new(Progress::default()) }
    }

    pub fn refiner(&self) -> &Refiner {
        &self.refiner
    }

    pub fn options(&self) -> &BatchOptions {
        &self.opts
    }

    /// Handle to the progress counter of the current or last batch.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// refine_all — refine every candidate, preserving input order.
    ///
    /// # Errors
    /// - [`RefineError::BackendError`] if a dedicated pool cannot be built.
    /// - With `robust_mode` off, the first per-point error in input order.
    pub fn refine_all<O>(&self, objective: Arc<O>, candidates: &[Point]) -> RefineResult<Vec<RefinementResult>>
    where
        O: Objective + ?Sized + 'static,
    {
        let _span = debug_span!("refine_batch", n = candidates.len(), workers = ?self.opts.workers).entered();
        self.progress.start(candidates.len());
        let total = candidates.len();
        let work = || -> Vec<RefineResult<RefinementResult>> {
            candidates
                .par_iter()
                .map(|x0| {
                    let res = self.refiner.refine(Arc::clone(&objective), x0);
                    let done = self.progress.advance();
                    debug!(done, total, "candidate refined");
                    res
                })
                .collect()
        };
        let outcomes = match self.opts.workers {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| RefineError::BackendError { text: format!("thread pool: {e}") })?
                .install(work),
            None => work(),
        };
        outcomes.into_iter().collect()
    }

    /// run — refine, validate gradients, and summarize.
    ///
    /// # Errors
    /// Same as [`BatchOrchestrator::refine_all`].
    pub fn run<O>(&self, objective: Arc<O>, candidates: &[Point]) -> RefineResult<BatchReport>
    where
        O: Objective + ?Sized + 'static,
    {
        let results = self.refine_all(Arc::clone(&objective), candidates)?;
        let refined: Vec<Point> = results.iter().map(|r| r.refined.clone()).collect();
        let gradient = GradientValidator::new(self.opts.gradient).validate(&refined, objective.as_ref());
        let records = results
            .iter()
            .zip(gradient.per_point.iter())
            .map(|(r, g)| ComparisonRecord::new(r, g))
            .collect();
        let summary = BatchSummary::from_results(&results, &gradient);
        debug!(
            n = summary.n_raw,
            converged = summary.n_converged,
            timeouts = summary.timing.n_timeouts,
            "batch finished"
        );
        Ok(BatchReport { results, records, gradient, summary })
    }

    /// assess_fidelity — same-basin verdict for each candidate and its
    /// refinement.
    ///
    /// # Errors
    /// - [`AnalysisError::LengthMismatch`] if `results` (or `hessians`) does
    ///   not have one entry per candidate.
    /// - Per-pair failures are returned in place.
    pub fn assess_fidelity<O: Objective + ?Sized>(
        &self, objective: &O, candidates: &[Point], results: &[RefinementResult],
        hessians: Option<&[Hessian]>,
    ) -> AnalysisResult<Vec<AnalysisResult<BasinFidelityResult>>> {
        if results.len() != candidates.len() {
            return Err(AnalysisError::LengthMismatch {
                what: "refinement results per candidate",
                expected: candidates.len(),
                found: results.len(),
            });
        }
        let pairs: Vec<(Point, Point)> = candidates
            .iter()
            .zip(results.iter())
            .map(|(x_star, r)| (x_star.clone(), r.refined.clone()))
            .collect();
        BasinFidelityAssessor::new(self.opts.fidelity).assess_pairs(&pairs, objective, hessians)
    }
}
