//! local_optimizer::diagnostics — convergence flags and reason labels.
//!
//! Purpose
//! -------
//! Translate the terminal state of a solver run into the per-criterion
//! flags and the single summarizing [`ConvergenceReason`] reported on a
//! refinement result.
//!
//! Key behaviors
//! -------------
//! - [`StopCause`] is a solver-agnostic view of Argmin's termination status.
//! - [`ConvergenceFlags::extract`] derives the four flags from the stop cause
//!   and the last-iteration quantities, without extra objective calls.
//! - [`ConvergenceReason::classify`] applies the fixed precedence
//!   `timeout > g_tol > f_tol > x_tol > iterations > error > unknown`.
//!
//! Conventions
//! -----------
//! - Reason labels are the lowercase strings `"x_tol"`, `"f_tol"`, `"g_tol"`,
//!   `"iterations"`, `"timeout"`, `"error"` and `"unknown"`, used both for
//!   `Display` and `FromStr`.
//! - For Nelder–Mead, `f_tol` is the simplex spread tolerance, so a solver
//!   convergence of the derivative-free method sets `f_converged`.
use crate::refinement::{errors::RefineError, local_optimizer::traits::Tolerances};
use argmin::core::{TerminationReason, TerminationStatus};
use std::{fmt, str::FromStr};

/// Why a solver stopped, independent of Argmin types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    SolverConverged,
    TargetCostReached,
    MaxItersReached,
    Timeout,
    Other(String),
    NotTerminated,
}

impl From<&TerminationStatus> for StopCause {
    fn from(status: &TerminationStatus) -> Self {
        match status {
            TerminationStatus::NotTerminated => StopCause::NotTerminated,
            TerminationStatus::Terminated(reason) => match reason {
                TerminationReason::SolverConverged => StopCause::SolverConverged,
                TerminationReason::TargetCostReached => StopCause::TargetCostReached,
                TerminationReason::MaxItersReached => StopCause::MaxItersReached,
                TerminationReason::Timeout => StopCause::Timeout,
                other => StopCause::Other(format!("{other:?}")),
            },
        }
    }
}

/// Quantities read off the final solver state.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalState {
    pub stop: StopCause,
    /// `‖∇f‖` at the last iterate, when the solver tracks a gradient.
    pub grad_norm: Option<f64>,
    /// `|f_k − f_{k−1}|` between the last two iterates.
    pub cost_change: Option<f64>,
    /// `‖x_k − x_{k−1}‖` between the last two iterates.
    pub step_norm: Option<f64>,
}

/// Per-criterion convergence flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceFlags {
    pub x_converged: bool,
    pub f_converged: bool,
    pub g_converged: bool,
    pub iteration_limit_reached: bool,
}

impl ConvergenceFlags {
    /// extract — derive the flags from a terminal solver state.
    ///
    /// Rules
    /// -----
    /// - `iteration_limit_reached` iff the solver stopped on `max_iters`.
    /// - `g_converged` iff a final gradient exists and `‖g‖ ≤ g_tol`.
    /// - `f_converged` iff the derivative-free solver reported convergence
    ///   (its spread test is `f_tol`), or the run was not cut by the
    ///   iteration limit and `|Δf| ≤ f_tol`.
    /// - `x_converged` iff not cut by the iteration limit and
    ///   `‖Δx‖ ≤ x_tol`.
    pub fn extract(state: &FinalState, tols: &Tolerances, derivative_free: bool) -> Self {
        let iteration_limit_reached = state.stop == StopCause::MaxItersReached;
        let within = |value: Option<f64>, tol: Option<f64>| match (value, tol) {
            (Some(v), Some(t)) => v.is_finite() && v <= t,
            _ => false,
        };
        let g_converged = within(state.grad_norm, tols.g_tol);
        let f_converged = (derivative_free && state.stop == StopCause::SolverConverged)
            || (!iteration_limit_reached && within(state.cost_change, tols.f_tol));
        let x_converged = !iteration_limit_reached && within(state.step_norm, tols.x_tol);
        Self { x_converged, f_converged, g_converged, iteration_limit_reached }
    }

    pub fn any_tolerance_met(&self) -> bool {
        self.x_converged || self.f_converged || self.g_converged
    }
}

/// Summary label for why a refinement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConvergenceReason {
    XTol,
    FTol,
    GTol,
    Iterations,
    Timeout,
    Error,
    Unknown,
}

impl ConvergenceReason {
    /// Every reason, in reporting order.
    pub const ALL: [ConvergenceReason; 7] = [
        ConvergenceReason::XTol,
        ConvergenceReason::FTol,
        ConvergenceReason::GTol,
        ConvergenceReason::Iterations,
        ConvergenceReason::Timeout,
        ConvergenceReason::Error,
        ConvergenceReason::Unknown,
    ];

    /// classify — pick the single reason for a finished refinement.
    ///
    /// Precedence: timeout, then g_tol, f_tol, x_tol, then the iteration
    /// limit, then `error` when not converged, else `unknown`.
    pub fn classify(flags: &ConvergenceFlags, converged: bool, timed_out: bool) -> Self {
        if timed_out {
            ConvergenceReason::Timeout
        } else if flags.g_converged {
            ConvergenceReason::GTol
        } else if flags.f_converged {
            ConvergenceReason::FTol
        } else if flags.x_converged {
            ConvergenceReason::XTol
        } else if flags.iteration_limit_reached {
            ConvergenceReason::Iterations
        } else if !converged {
            ConvergenceReason::Error
        } else {
            ConvergenceReason::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceReason::XTol => "x_tol",
            ConvergenceReason::FTol => "f_tol",
            ConvergenceReason::GTol => "g_tol",
            ConvergenceReason::Iterations => "iterations",
            ConvergenceReason::Timeout => "timeout",
            ConvergenceReason::Error => "error",
            ConvergenceReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvergenceReason {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConvergenceReason::ALL.into_iter().find(|r| r.as_str() == s).ok_or(
            RefineError::InvalidParameter { text: format!("unknown convergence reason '{s}'") },
        )
    }
}

/// Coarse convergence verdict: any tolerance met, or the solver itself
/// declared convergence.
pub fn is_converged(flags: &ConvergenceFlags, stop: &StopCause) -> bool {
    flags.any_tolerance_met()
        || matches!(stop, StopCause::SolverConverged | StopCause::TargetCostReached)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Flag extraction for gradient-based and derivative-free stops.
    // - Reason precedence and string round-trips.
    // -------------------------------------------------------------------------

    fn state(stop: StopCause, g: Option<f64>, df: Option<f64>, dx: Option<f64>) -> FinalState {
        FinalState { stop, grad_norm: g, cost_change: df, step_norm: dx }
    }

    #[test]
    // Purpose
    // -------
    // A gradient-based run that met the gradient tolerance sets g_converged
    // and is labelled g_tol even if other tolerances also hold.
    fn gradient_tolerance_takes_precedence() {
        // Arrange
        let tols = Tolerances::default();
        let s = state(StopCause::SolverConverged, Some(1e-10), Some(0.0), Some(0.0));

        // Act
        let flags = ConvergenceFlags::extract(&s, &tols, false);
        let reason = ConvergenceReason::classify(&flags, is_converged(&flags, &s.stop), false);

        // Assert
        assert!(flags.g_converged && flags.f_converged && flags.x_converged);
        assert_eq!(reason, ConvergenceReason::GTol);
    }

    #[test]
    fn derivative_free_convergence_sets_f_flag() {
        let tols = Tolerances::default();
        let s = state(StopCause::SolverConverged, None, Some(1.0), Some(1.0));
        let flags = ConvergenceFlags::extract(&s, &tols, true);
        assert!(flags.f_converged);
        assert!(!flags.g_converged);
        assert_eq!(
            ConvergenceReason::classify(&flags, is_converged(&flags, &s.stop), false),
            ConvergenceReason::FTol
        );
    }

    #[test]
    // Purpose
    // -------
    // Hitting the iteration cap suppresses the step-based flags and yields
    // the `iterations` label with converged = false.
    fn iteration_limit_labels_iterations() {
        // Arrange
        let tols = Tolerances::default();
        let s = state(StopCause::MaxItersReached, None, Some(0.0), Some(0.0));

        // Act
        let flags = ConvergenceFlags::extract(&s, &tols, true);
        let converged = is_converged(&flags, &s.stop);

        // Assert
        assert!(flags.iteration_limit_reached);
        assert!(!flags.f_converged && !flags.x_converged);
        assert!(!converged);
        assert_eq!(ConvergenceReason::classify(&flags, converged, false), ConvergenceReason::Iterations);
    }

    #[test]
    fn timeout_overrides_everything() {
        let flags = ConvergenceFlags {
            x_converged: true,
            f_converged: true,
            g_converged: true,
            iteration_limit_reached: true,
        };
        assert_eq!(ConvergenceReason::classify(&flags, true, true), ConvergenceReason::Timeout);
    }

    #[test]
    fn unflagged_outcomes_split_into_error_and_unknown() {
        let flags = ConvergenceFlags::default();
        assert_eq!(ConvergenceReason::classify(&flags, false, false), ConvergenceReason::Error);
        assert_eq!(ConvergenceReason::classify(&flags, true, false), ConvergenceReason::Unknown);
    }

    #[test]
    fn reason_strings_round_trip() {
        for reason in ConvergenceReason::ALL {
            assert_eq!(reason.to_string().parse::<ConvergenceReason>(), Ok(reason));
        }
        assert!("bogus".parse::<ConvergenceReason>().is_err());
    }

    #[test]
    fn stop_cause_maps_argmin_status() {
        let status = TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        assert_eq!(StopCause::from(&status), StopCause::MaxItersReached);
        assert_eq!(StopCause::from(&TerminationStatus::NotTerminated), StopCause::NotTerminated);
    }
}
