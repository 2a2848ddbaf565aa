//! Execution helpers that run an `argmin` solver on an [`ArgMinAdapter`]
//! and return a crate-friendly [`SolverRun`].
use crate::refinement::{
    errors::RefineResult,
    local_optimizer::{
        adapter::ArgMinAdapter,
        diagnostics::{FinalState, StopCause},
        traits::{Objective, RefineOptions},
        types::{Cost, GradState, Point, Simplex, SimplexState},
        validation::validate_best_param,
    },
};
use argmin::core::{Executor, State};
use argmin_math::ArgminL2Norm;

/// Terminal view of a solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRun {
    pub best_param: Point,
    pub best_cost: Cost,
    pub iterations: u64,
    pub final_state: FinalState,
}

/// Run an L-BFGS solver (any line search) from `x0`.
///
/// This wires up:
/// - the user objective via [`ArgMinAdapter`],
/// - the solver from the builders,
/// - the initial parameter and optional `max_iters`,
/// - an optional slog observer (feature `obs_slog`, only when
///   `opts.verbose`),
///
/// then executes and converts the final state into a [`SolverRun`].
///
/// # Errors
/// - Any `argmin` runtime error (line-search failure, objective error,
///   passed deadline) via the crate's `From<argmin::core::Error>`.
/// - [`RefineError::MissingBestParam`](crate::refinement::errors::RefineError::MissingBestParam)
///   if the solver never recorded a best parameter.
pub fn run_lbfgs<'a, O, S>(
    x0: Point, opts: &RefineOptions, problem: ArgMinAdapter<'a, O>, solver: S,
) -> RefineResult<SolverRun>
where
    O: Objective + ?Sized,
    S: argmin::core::Solver<ArgMinAdapter<'a, O>, GradState> + Send + 'static,
{
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(x0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let final_state = FinalState {
        stop: StopCause::from(result.get_termination_status()),
        grad_norm: result.get_gradient().map(|g| g.l2_norm()),
        cost_change: cost_change(result.get_cost(), result.get_prev_cost()),
        step_norm: step_norm(result.get_param(), result.get_prev_param()),
    };
    let iterations = result.get_iter();
    let best_cost = result.get_best_cost();
    let best_param = validate_best_param(result.take_best_param())?;
    Ok(SolverRun { best_param, best_cost, iterations, final_state })
}

/// Run a Nelder–Mead solver built around `x0`.
///
/// Same wiring and error contract as [`run_lbfgs`]; the state carries no
/// gradient, so `grad_norm` is always `None`.
pub fn run_nelder_mead<'a, O>(
    x0: Point, opts: &RefineOptions, problem: ArgMinAdapter<'a, O>, solver: Simplex,
) -> RefineResult<SolverRun>
where
    O: Objective + ?Sized,
{
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state: SimplexState| state.param(x0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let final_state = FinalState {
        stop: StopCause::from(result.get_termination_status()),
        grad_norm: None,
        cost_change: cost_change(result.get_cost(), result.get_prev_cost()),
        step_norm: step_norm(result.get_param(), result.get_prev_param()),
    };
    let iterations = result.get_iter();
    let best_cost = result.get_best_cost();
    let best_param = validate_best_param(result.take_best_param())?;
    Ok(SolverRun { best_param, best_cost, iterations, final_state })
}

// ---- Helper Methods ----

fn cost_change(cost: Cost, prev_cost: Cost) -> Option<f64> {
    let delta = (cost - prev_cost).abs();
    delta.is_finite().then_some(delta)
}

fn step_norm(param: Option<&Point>, prev_param: Option<&Point>) -> Option<f64> {
    match (param, prev_param) {
        (Some(p), Some(q)) if p.len() == q.len() => Some((p - q).l2_norm()),
        _ => None,
    }
}
