//! local_optimizer::strategy — the closed set of local optimizers.
//!
//! Purpose
//! -------
//! Present every local optimizer behind one interface, [`LocalOptimizer`]:
//! given an objective, a start point and options, run to a stop and return
//! the refined point together with its diagnostics. The refinement entry
//! point selects an implementation from [`Method`] via [`Strategy`].
//!
//! Key behaviors
//! -------------
//! - [`GradientBased`]: L-BFGS with the configured line search; gradients
//!   are analytic when the objective provides them, else finite differences.
//! - [`DerivativeFree`]: Nelder–Mead on a per-coordinate initial simplex.
//!   Objective errors at the starting vertices are returned before the
//!   solver starts; non-finite values anywhere count as `+∞`.
//! - Both translate the final solver state into [`ConvergenceFlags`] without
//!   extra objective evaluations.
//!
//! Invariants & assumptions
//! ------------------------
//! - All objective calls go through an [`ArgMinAdapter`] bound to the given
//!   [`RunControl`], so deadlines and counters apply uniformly.
//! - The returned value is the best cost recorded by the solver, which is
//!   never worse than the cost at `x0`.
use crate::refinement::{
    errors::RefineResult,
    local_optimizer::{
        adapter::ArgMinAdapter,
        builders::{
            build_optimizer_hager_zhang, build_optimizer_more_thuente, build_simplex, initial_simplex,
        },
        diagnostics::{ConvergenceFlags, StopCause, is_converged},
        run::{SolverRun, run_lbfgs, run_nelder_mead},
        traits::{LineSearcher, Method, Objective, RefineOptions},
        types::{Cost, Point},
        watchdog::RunControl,
    },
};

/// Diagnostics of one local run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDiagnostics {
    pub iterations: u64,
    pub flags: ConvergenceFlags,
    pub converged: bool,
    pub stop: StopCause,
}

/// Refined point, its value, and how the run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRun {
    pub point: Point,
    pub value: Cost,
    pub diagnostics: RunDiagnostics,
}

/// A local optimizer: runs from `x0` to a stop.
pub trait LocalOptimizer {
    /// # Errors
    /// Solver construction failures, objective errors, and
    /// `RefineError::DeadlineExceeded` once `control` expires.
    fn run<O: Objective + ?Sized>(
        &self, objective: &O, x0: Point, opts: &RefineOptions, control: &RunControl,
    ) -> RefineResult<LocalRun>;
}

/// L-BFGS with a configurable line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientBased {
    pub line_searcher: LineSearcher,
}

impl LocalOptimizer for GradientBased {
    fn run<O: Objective + ?Sized>(
        &self, objective: &O, x0: Point, opts: &RefineOptions, control: &RunControl,
    ) -> RefineResult<LocalRun> {
        let problem = ArgMinAdapter::new(objective, control);
        let run = match self.line_searcher {
            LineSearcher::HagerZhang => {
                let solver = build_optimizer_hager_zhang(opts)?;
                run_lbfgs(x0, opts, problem, solver)?
            }
            LineSearcher::MoreThuente => {
                let solver = build_optimizer_more_thuente(opts)?;
                run_lbfgs(x0, opts, problem, solver)?
            }
        };
        Ok(into_local_run(run, opts))
    }
}

/// Nelder–Mead simplex search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivativeFree;

impl LocalOptimizer for DerivativeFree {
    fn run<O: Objective + ?Sized>(
        &self, objective: &O, x0: Point, opts: &RefineOptions, control: &RunControl,
    ) -> RefineResult<LocalRun> {
        let solver = build_simplex(&x0, opts)?;
        let problem = ArgMinAdapter::penalizing(objective, control);
        problem.check_vertices(&initial_simplex(&x0, opts.simplex_scale))?;
        let run = run_nelder_mead(x0, opts, problem, solver)?;
        Ok(into_local_run(run, opts))
    }
}

/// Strategy selected from a [`Method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    GradientBased(GradientBased),
    DerivativeFree(DerivativeFree),
}

impl Strategy {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GradientBased { line_searcher } => {
                Strategy::GradientBased(GradientBased { line_searcher })
            }
            Method::DerivativeFree => Strategy::DerivativeFree(DerivativeFree),
        }
    }
}

impl LocalOptimizer for Strategy {
    fn run<O: Objective + ?Sized>(
        &self, objective: &O, x0: Point, opts: &RefineOptions, control: &RunControl,
    ) -> RefineResult<LocalRun> {
        match self {
            Strategy::GradientBased(inner) => inner.run(objective, x0, opts, control),
            Strategy::DerivativeFree(inner) => inner.run(objective, x0, opts, control),
        }
    }
}

fn into_local_run(run: SolverRun, opts: &RefineOptions) -> LocalRun {
    let flags =
        ConvergenceFlags::extract(&run.final_state, &opts.tols, opts.method.is_derivative_free());
    let converged = is_converged(&flags, &run.final_state.stop);
    LocalRun {
        point: run.best_param,
        value: run.best_cost,
        diagnostics: RunDiagnostics {
            iterations: run.iterations,
            flags,
            converged,
            stop: run.final_state.stop,
        },
    }
}
