//! Structured error types for the periodic scheduler.
//!
//! Three enums model the three failure layers: registration
//! ([`SchedulingError`]), mode transitions ([`ModeTransitionError`]) and
//! per-release timing ([`TimingError`]). Every variant carries enough data
//! for the caller to make a control decision from the value alone; lower
//! layers log detail but never re-throw past the loop boundary.

use std::time::Duration;

use thiserror::Error;

/// Why a parameter set failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("period must be positive")]
    ZeroPeriod,

    #[error("relative deadline {deadline:?} is shorter than execution cost {cost:?}")]
    DeadlineShorterThanCost { deadline: Duration, cost: Duration },
}

/// Registration / admission failure. Fatal: abort startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    /// The submitted parameters violate an invariant.
    #[error("invalid task parameters: {0}")]
    InvalidParameters(#[from] ParamsError),

    /// The active scheduling plugin cannot admit the task.
    #[error("scheduling plugin '{plugin}' rejected the task: {reason}")]
    PluginRejected { plugin: String, reason: String },

    /// `submit` was already called for this scheduler.
    #[error("task parameters already registered")]
    AlreadyRegistered,
}

/// Background/real-time mode transition failure. Fatal: abort with
/// best-effort cleanup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModeTransitionError {
    /// `enter_real_time` was called before a successful `submit`.
    #[error("no task parameters submitted")]
    NotSubmitted,

    /// `enter_real_time` was called while already in real-time mode.
    #[error("already in real-time mode")]
    AlreadyRealTime,

    /// The underlying runtime refused the transition.
    #[error("mode transition rejected: {0}")]
    TransitionRejected(String),
}

/// Per-release timing condition. Reported, not necessarily fatal; the job
/// loop decides whether to tolerate or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimingError {
    /// The previous job exceeded its execution-cost budget and the policy
    /// is `Enforce`. Cadence bookkeeping has still advanced.
    #[error("budget overrun: job ran {observed:?}, budget {budget:?}")]
    Overrun { budget: Duration, observed: Duration },

    /// `wait_for_next_period` was called outside real-time mode.
    #[error("not in real-time mode")]
    NotRealTime,
}
