//! Task records, lifecycle states, and enqueue payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Lifecycle state of a task.
///
/// `queued → running → {done, failed}`, `queued → canceled`,
/// `running → canceled`. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue for admission.
    Queued,
    /// Process launched and being tracked.
    Running,
    /// Process exited with code 0.
    Done,
    /// Process exited non-zero, could not be launched, or was lost.
    Failed,
    /// Canceled by a caller.
    Canceled,
}

impl TaskState {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            other => Err(SchedulerError::Validation(format!("unknown task state `{other}`"))),
        }
    }
}

/// Filter for listing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    /// Every task regardless of state.
    #[default]
    Any,
    /// Only tasks in the given state.
    Only(TaskState),
}

impl StateFilter {
    /// Whether a task in `state` passes this filter.
    pub fn matches(self, state: TaskState) -> bool {
        match self {
            Self::Any => true,
            Self::Only(wanted) => wanted == state,
        }
    }
}

impl FromStr for StateFilter {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        trimmed.parse().map(Self::Only)
    }
}

impl From<TaskState> for StateFilter {
    fn from(state: TaskState) -> Self {
        Self::Only(state)
    }
}

/// Resources a task declares; the part of a task the admission check reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceEnvelope {
    /// Highest total CPU % at which the task may start.
    pub max_cpu_pct: u32,
    /// Free memory the task needs, in MB.
    pub max_mem_mb: u64,
    /// Task needs a GPU.
    pub requires_gpu: bool,
    /// Free VRAM the task needs, in MB (0 = no requirement).
    pub min_vram_mb: u64,
}

impl Default for ResourceEnvelope {
    fn default() -> Self {
        Self {
            max_cpu_pct: 100,
            max_mem_mb: 0,
            requires_gpu: false,
            min_vram_mb: 0,
        }
    }
}

/// Enqueue payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Display name; blank names become `"task"`.
    #[serde(default)]
    pub name: String,
    /// Shell command line to run.
    pub command: String,
    /// Lower number dequeues first.
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Resource envelope.
    #[serde(flatten)]
    pub resources: ResourceEnvelope,
    /// Optional runtime estimate in seconds.
    #[serde(default)]
    pub est_runtime_sec: Option<u64>,
    /// Optional deadline.
    #[serde(default)]
    pub deadline_ts: Option<DateTime<Utc>>,
}

const fn default_priority() -> i64 {
    5
}

impl TaskSpec {
    /// Create a spec with default priority and an unconstrained envelope.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            priority: default_priority(),
            resources: ResourceEnvelope::default(),
            est_runtime_sec: None,
            deadline_ts: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set the CPU ceiling.
    #[must_use]
    pub const fn with_max_cpu_pct(mut self, pct: u32) -> Self {
        self.resources.max_cpu_pct = pct;
        self
    }

    /// Set the memory requirement.
    #[must_use]
    pub const fn with_max_mem_mb(mut self, mb: u64) -> Self {
        self.resources.max_mem_mb = mb;
        self
    }

    /// Require a GPU with at least `min_vram_mb` free.
    #[must_use]
    pub const fn with_gpu(mut self, min_vram_mb: u64) -> Self {
        self.resources.requires_gpu = true;
        self.resources.min_vram_mb = min_vram_mb;
        self
    }

    /// Set the runtime estimate.
    #[must_use]
    pub const fn with_est_runtime_sec(mut self, secs: u64) -> Self {
        self.est_runtime_sec = Some(secs);
        self
    }

    /// Set the deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline_ts = Some(deadline);
        self
    }

    /// Validate the payload before it is persisted.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.command.trim().is_empty() {
            return Err(SchedulerError::Validation("command must not be empty".into()));
        }
        let cpu = self.resources.max_cpu_pct;
        if cpu == 0 || cpu > 100 {
            return Err(SchedulerError::Validation(format!(
                "max_cpu_pct must be within 1..=100, got {cpu}"
            )));
        }
        Ok(())
    }
}

/// A unit of work and its full lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Time-sortable unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Command line.
    pub command: String,
    /// Runtime estimate in seconds.
    pub est_runtime_sec: Option<u64>,
    /// Task needs a GPU.
    pub requires_gpu: bool,
    /// Required free VRAM in MB.
    pub min_vram_mb: u64,
    /// CPU ceiling in percent.
    pub max_cpu_pct: u32,
    /// Required free memory in MB.
    pub max_mem_mb: u64,
    /// Lower number dequeues first.
    pub priority: i64,
    /// Optional deadline.
    pub deadline_ts: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub state: TaskState,
    /// Free-text outcome, e.g. a launch error.
    pub result: Option<String>,
    /// Creation time; also the FIFO key among equal priorities.
    pub created_at: DateTime<Utc>,
    /// Launch time.
    pub started_at: Option<DateTime<Utc>>,
    /// Time the task reached a terminal state through the reap phase or a failure.
    pub ended_at: Option<DateTime<Utc>>,
    /// OS process id once launched.
    pub pid: Option<u32>,
    /// Process exit code once reaped.
    pub return_code: Option<i32>,
    /// Captured output location once launched.
    pub log_path: Option<String>,
}

impl Task {
    /// Build a fresh `queued` task from a validated spec.
    pub fn from_spec(id: String, spec: TaskSpec, created_at: DateTime<Utc>) -> Self {
        let name = if spec.name.trim().is_empty() {
            "task".to_string()
        } else {
            spec.name
        };
        Self {
            id,
            name,
            command: spec.command,
            est_runtime_sec: spec.est_runtime_sec,
            requires_gpu: spec.resources.requires_gpu,
            min_vram_mb: spec.resources.min_vram_mb,
            max_cpu_pct: spec.resources.max_cpu_pct,
            max_mem_mb: spec.resources.max_mem_mb,
            priority: spec.priority,
            deadline_ts: spec.deadline_ts,
            state: TaskState::Queued,
            result: None,
            created_at,
            started_at: None,
            ended_at: None,
            pid: None,
            return_code: None,
            log_path: None,
        }
    }

    /// Resource envelope for admission.
    pub const fn envelope(&self) -> ResourceEnvelope {
        ResourceEnvelope {
            max_cpu_pct: self.max_cpu_pct,
            max_mem_mb: self.max_mem_mb,
            requires_gpu: self.requires_gpu,
            min_vram_mb: self.min_vram_mb,
        }
    }
}
