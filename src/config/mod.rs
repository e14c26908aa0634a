//! Configuration module
//!
//! Startup configuration for the playback task: input path plus the
//! real-time timing knobs. Values come from an optional JSON file with
//! CLI flags taking precedence; defaults mirror the reference timing
//! constants (10 ms period, 10 ms execution cost, 100 ms deadline).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rt::{BudgetPolicy, Priority, TaskClass, TaskParams};

fn default_period_ms() -> u64 {
    10
}

fn default_exec_cost_ms() -> u64 {
    10
}

fn default_deadline_ms() -> u64 {
    100
}

/// Playback task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Input media file.
    pub input: PathBuf,

    /// Release period in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Execution-cost budget per release in milliseconds.
    #[serde(default = "default_exec_cost_ms")]
    pub exec_cost_ms: u64,

    /// Relative deadline in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub relative_deadline_ms: u64,

    /// Report budget overruns instead of ignoring them.
    #[serde(default)]
    pub enforce_budget: bool,

    /// Advisory task class.
    #[serde(default)]
    pub class: TaskClass,

    /// Fixed priority; absent means "lowest".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// CPU the task is pinned to; absent means global scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
}

impl PlaybackConfig {
    /// Configuration for `input` with the reference timing defaults.
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            period_ms: default_period_ms(),
            exec_cost_ms: default_exec_cost_ms(),
            relative_deadline_ms: default_deadline_ms(),
            enforce_budget: false,
            class: TaskClass::default(),
            priority: None,
            cpu: None,
        }
    }

    /// Load configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
        let config: PlaybackConfig =
            serde_json::from_str(&content).context("failed to parse config")?;
        Ok(config)
    }

    /// Real-time task parameters described by this configuration.
    pub fn task_params(&self) -> TaskParams {
        TaskParams {
            exec_cost: Duration::from_millis(self.exec_cost_ms),
            period: Duration::from_millis(self.period_ms),
            relative_deadline: Duration::from_millis(self.relative_deadline_ms),
            budget_policy: if self.enforce_budget {
                BudgetPolicy::Enforce
            } else {
                BudgetPolicy::NoEnforcement
            },
            class: self.class,
            priority: match self.priority {
                Some(p) => Priority::Fixed(p),
                None => Priority::Lowest,
            },
            partition: self.cpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = PlaybackConfig::new(PathBuf::from("sample.mp4"));
        assert_eq!(config.period_ms, 10);
        assert_eq!(config.exec_cost_ms, 10);
        assert_eq!(config.relative_deadline_ms, 100);
        assert!(!config.enforce_budget);
    }

    #[test]
    fn default_params_are_valid() {
        let config = PlaybackConfig::new(PathBuf::from("sample.mp4"));
        assert!(config.task_params().validate().is_ok());
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{ "input": "sample.mp4" }"#).unwrap();
        assert_eq!(config.input, PathBuf::from("sample.mp4"));
        assert_eq!(config.period_ms, 10);
        assert_eq!(config.class, TaskClass::Soft);
        assert_eq!(config.cpu, None);
    }

    #[test]
    fn full_json_round_trips_into_params() {
        let config: PlaybackConfig = serde_json::from_str(
            r#"{
                "input": "sample.mp4",
                "period_ms": 40,
                "exec_cost_ms": 20,
                "relative_deadline_ms": 40,
                "enforce_budget": true,
                "class": "hard",
                "priority": 50,
                "cpu": 2
            }"#,
        )
        .unwrap();

        let params = config.task_params();
        assert_eq!(params.period, Duration::from_millis(40));
        assert_eq!(params.exec_cost, Duration::from_millis(20));
        assert_eq!(params.relative_deadline, Duration::from_millis(40));
        assert_eq!(params.budget_policy, BudgetPolicy::Enforce);
        assert_eq!(params.class, TaskClass::Hard);
        assert_eq!(params.priority, Priority::Fixed(50));
        assert_eq!(params.partition, Some(2));
    }
}
