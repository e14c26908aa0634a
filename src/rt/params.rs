//! Real-time task parameters
//!
//! The descriptor a thread submits to the scheduler before entering
//! real-time mode. Immutable once submitted.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ParamsError;

/// What to do when a job exceeds its execution-cost budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetPolicy {
    /// Overruns are ignored; the job keeps its cadence silently.
    #[default]
    NoEnforcement,
    /// Overruns are reported from `wait_for_next_period`.
    Enforce,
}

/// Advisory task class. Most scheduling plugins ignore it; the native
/// plugin uses `Hard` as the trigger for OS-level elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskClass {
    Hard,
    #[default]
    Soft,
    BestEffort,
}

impl TaskClass {
    /// Display name for logs and CLI parsing.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskClass::Hard => "hard",
            TaskClass::Soft => "soft",
            TaskClass::BestEffort => "best-effort",
        }
    }
}

impl FromStr for TaskClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hard" => Ok(TaskClass::Hard),
            "soft" => Ok(TaskClass::Soft),
            "best-effort" => Ok(TaskClass::BestEffort),
            other => Err(format!("unknown task class '{}'", other)),
        }
    }
}

/// Task priority. Only fixed-priority plugins consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Sentinel for "lowest available priority".
    #[default]
    Lowest,
    /// Explicit fixed priority value.
    Fixed(i32),
}

/// Parameters of a periodic real-time task.
///
/// All durations carry nanosecond resolution. Invariants checked by
/// [`TaskParams::validate`]:
///
/// * `period > 0`
/// * `relative_deadline >= exec_cost`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskParams {
    /// Declared upper bound on CPU consumption per release.
    pub exec_cost: Duration,

    /// Interval between successive job releases.
    pub period: Duration,

    /// Maximum allowed time from a release to job completion.
    pub relative_deadline: Duration,

    /// Budget overrun handling.
    pub budget_policy: BudgetPolicy,

    /// Advisory class.
    pub class: TaskClass,

    /// Priority for fixed-priority plugins.
    pub priority: Priority,

    /// Optional CPU the task is pinned to. `None` means global scheduling.
    pub partition: Option<u32>,
}

impl TaskParams {
    /// Build a parameter set with the given timing and defaults for the
    /// remaining fields (no enforcement, soft class, lowest priority,
    /// no partition).
    pub fn new(exec_cost: Duration, period: Duration, relative_deadline: Duration) -> Self {
        Self {
            exec_cost,
            period,
            relative_deadline,
            budget_policy: BudgetPolicy::default(),
            class: TaskClass::default(),
            priority: Priority::default(),
            partition: None,
        }
    }

    /// Check the parameter invariants.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.period.is_zero() {
            return Err(ParamsError::ZeroPeriod);
        }
        if self.relative_deadline < self.exec_cost {
            return Err(ParamsError::DeadlineShorterThanCost {
                deadline: self.relative_deadline,
                cost: self.exec_cost,
            });
        }
        Ok(())
    }

    /// CPU utilization fraction: `exec_cost / period`.
    ///
    /// Returns `0.0` when `period` is zero to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.period.is_zero() {
            0.0
        } else {
            self.exec_cost.as_secs_f64() / self.period.as_secs_f64()
        }
    }
}
