//! Scheduler configuration structures.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::policy::{preset, DEFAULT_PRESET};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SCHEDULER_";

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrently running task processes.
    pub max_parallel: usize,
    /// Preset seeded when no policy is active.
    pub default_policy: String,
    /// Seconds between ticks.
    pub queue_check_interval_secs: u64,
    /// Per-task log size that triggers rotation, in MB.
    pub task_log_size_mb: u64,
    /// Directory for captured task output.
    pub log_dir: PathBuf,
    /// Location of the durable state document.
    pub state_path: PathBuf,
    /// Start the tick loop as soon as the scheduler is built.
    pub enable_auto_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 2,
            default_policy: DEFAULT_PRESET.to_string(),
            queue_check_interval_secs: 5,
            task_log_size_mb: 10,
            log_dir: PathBuf::from(".scheduler/logs"),
            state_path: PathBuf::from(".scheduler/state.json"),
            enable_auto_start: true,
        }
    }
}

fn env_var<T: FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    let name = format!("{ENV_PREFIX}{key}");
    match std::env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}={raw:?}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}")),
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel == 0 {
            return Err("max_parallel must be greater than 0".into());
        }
        if self.queue_check_interval_secs == 0 {
            return Err("queue_check_interval_secs must be greater than 0".into());
        }
        if self.task_log_size_mb == 0 {
            return Err("task_log_size_mb must be greater than 0".into());
        }
        if preset(&self.default_policy).is_none() {
            return Err(format!(
                "default_policy `{}` is not a built-in preset",
                self.default_policy
            ));
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `SCHEDULER_*` variables, after loading `.env`
    /// from the working directory if present.
    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(format!(".env: {e}"));
            }
        }
        let mut cfg = Self::default();
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SCHEDULER_*` overrides onto `self`.
    pub fn apply_env(&mut self) -> Result<(), String> {
        if let Some(v) = env_var("MAX_PARALLEL")? {
            self.max_parallel = v;
        }
        if let Some(v) = env_var("DEFAULT_POLICY")? {
            self.default_policy = v;
        }
        if let Some(v) = env_var("QUEUE_CHECK_INTERVAL_SECS")? {
            self.queue_check_interval_secs = v;
        }
        if let Some(v) = env_var("TASK_LOG_SIZE_MB")? {
            self.task_log_size_mb = v;
        }
        if let Some(v) = env_var("LOG_DIR")? {
            self.log_dir = v;
        }
        if let Some(v) = env_var("STATE_PATH")? {
            self.state_path = v;
        }
        if let Some(v) = env_var("ENABLE_AUTO_START")? {
            self.enable_auto_start = v;
        }
        Ok(())
    }

    /// Tick interval.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.queue_check_interval_secs)
    }

    /// Log rotation threshold in bytes.
    pub const fn max_log_bytes(&self) -> u64 {
        self.task_log_size_mb.saturating_mul(1024 * 1024)
    }
}
