//! local_optimizer::watchdog — wall-clock budget and shared run bookkeeping.
//!
//! Purpose
//! -------
//! Enforce a hard per-point timeout around a solver run without trusting the
//! solver to cooperate. The run executes on a dedicated worker thread; the
//! caller waits on a channel with a deadline and, if the budget expires,
//! stops waiting and reports the best point observed so far.
//!
//! Key behaviors
//! -------------
//! - [`RunControl`] is shared (via `Arc`) between the caller and the worker.
//!   It carries the deadline, a cancellation flag, evaluation counters and
//!   the best `(point, value)` seen by the objective adapter.
//! - [`run_with_deadline`] spawns the worker, waits with `recv_timeout`, and
//!   converts the three possible endings (result, timeout, panic) into a
//!   [`WatchdogOutcome`].
//!
//! Invariants & assumptions
//! ------------------------
//! - After a timeout the worker is detached, not killed. The adapter checks
//!   [`RunControl::check`] before every evaluation, so the worker stops at
//!   its next objective call.
//! - Counters and the best point only ever move forward; reads from the
//!   caller after a timeout see a consistent snapshot of the best pair.
use crate::refinement::{
    errors::{RefineError, RefineResult},
    local_optimizer::types::{Cost, Point},
};
use std::{
    any::Any,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

/// Shared state between a refinement worker and its supervisor.
#[derive(Debug)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancelled: AtomicBool,
    f_calls: AtomicU64,
    g_calls: AtomicU64,
    best: Mutex<Option<(Point, Cost)>>,
}

impl RunControl {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            cancelled: AtomicBool::new(false),
            f_calls: AtomicU64::new(0),
            g_calls: AtomicU64::new(0),
            best: Mutex::new(None),
        }
    }

    /// Control block that never expires.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with [`RefineError::DeadlineExceeded`] once the run was
    /// cancelled or the deadline has passed.
    pub fn check(&self) -> RefineResult<()> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(RefineError::DeadlineExceeded);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RefineError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn record_cost_call(&self) {
        self.f_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grad_call(&self) {
        self.g_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn f_calls(&self) -> u64 {
        self.f_calls.load(Ordering::Relaxed)
    }

    pub fn g_calls(&self) -> u64 {
        self.g_calls.load(Ordering::Relaxed)
    }

    /// Record an evaluated pair; keeps it only if finite and strictly better.
    pub fn observe(&self, x: &Point, value: Cost) {
        if !value.is_finite() {
            return;
        }
        let mut best = self.best.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let improves = match best.as_ref() {
            Some((_, current)) => value < *current,
            None => true,
        };
        if improves {
            *best = Some((x.clone(), value));
        }
    }

    /// Snapshot of the best `(point, value)` observed so far.
    pub fn best(&self) -> Option<(Point, Cost)> {
        self.best.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

/// How a supervised job ended.
#[derive(Debug)]
pub enum WatchdogOutcome<T> {
    /// The job returned within budget.
    Finished(T),
    /// The deadline passed first; the worker was cancelled and detached.
    TimedOut,
    /// The worker panicked; carries the panic message.
    Panicked(String),
}

/// run_with_deadline — execute `job` on a worker thread under a deadline.
///
/// Parameters
/// ----------
/// - `control`: shared control block; cancelled here on timeout.
/// - `job`: the work to run. It receives nothing and must own its inputs.
///
/// Returns
/// -------
/// A [`WatchdogOutcome`]; the remaining budget is derived from
/// `control.deadline()` at call time.
///
/// Errors
/// ------
/// - [`RefineError::BackendError`] if the worker thread cannot be spawned.
pub fn run_with_deadline<T, J>(control: &RunControl, job: J) -> RefineResult<WatchdogOutcome<T>>
where
    T: Send + 'static,
    J: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("critpoint-refine".to_string())
        .spawn(move || {
            let out = job();
            let _ = tx.send(out);
        })
        .map_err(|e| RefineError::BackendError { text: format!("failed to spawn worker: {e}") })?;

    let received = match control.deadline() {
        Some(deadline) => {
            let budget = deadline.saturating_duration_since(Instant::now());
            rx.recv_timeout(budget.max(Duration::from_millis(1)))
        }
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };

    match received {
        Ok(value) => {
            let _ = handle.join();
            Ok(WatchdogOutcome::Finished(value))
        }
        Err(RecvTimeoutError::Timeout) => {
            control.cancel();
            Ok(WatchdogOutcome::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => match handle.join() {
            Err(payload) => Ok(WatchdogOutcome::Panicked(panic_message(payload.as_ref()))),
            Ok(()) => Ok(WatchdogOutcome::Panicked("worker exited without a result".to_string())),
        },
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
