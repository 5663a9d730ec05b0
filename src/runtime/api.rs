//! API-facing request/response models and thin wrappers over [`Scheduler`].
//!
//! HTTP, CLI, or UI front ends deserialize these payloads, call the matching
//! function, and serialize the response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    ResourceEnvelope, Rules, Scheduler, SchedulerError, SimulationPlan, StateFilter, Task,
    TaskSpec, TaskState, WhatIf,
};

/// Task submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Display name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Command line.
    pub command: String,
    /// Task needs a GPU.
    #[serde(default)]
    pub requires_gpu: bool,
    /// Runtime estimate in seconds.
    #[serde(default)]
    pub est_runtime_sec: Option<u64>,
    /// Lower number runs first.
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Optional deadline.
    #[serde(default)]
    pub deadline_ts: Option<DateTime<Utc>>,
    /// CPU ceiling in percent.
    #[serde(default = "default_max_cpu_pct")]
    pub max_cpu_pct: u32,
    /// Required free memory in MB.
    #[serde(default)]
    pub max_mem_mb: u64,
    /// Required free VRAM in MB.
    #[serde(default)]
    pub min_vram_mb: u64,
}

fn default_name() -> String {
    "task".to_string()
}

const fn default_priority() -> i64 {
    5
}

const fn default_max_cpu_pct() -> u32 {
    90
}

impl From<EnqueueRequest> for TaskSpec {
    fn from(req: EnqueueRequest) -> Self {
        Self {
            name: req.name,
            command: req.command,
            priority: req.priority,
            resources: ResourceEnvelope {
                max_cpu_pct: req.max_cpu_pct,
                max_mem_mb: req.max_mem_mb,
                requires_gpu: req.requires_gpu,
                min_vram_mb: req.min_vram_mb,
            },
            est_runtime_sec: req.est_runtime_sec,
            deadline_ts: req.deadline_ts,
        }
    }
}

/// Submission result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueResponse {
    /// Assigned id.
    pub task_id: String,
    /// Initial state, always `queued`.
    pub state: TaskState,
}

/// Task row for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Command line.
    pub command: String,
    /// Current state.
    pub state: TaskState,
    /// Current priority number.
    pub priority: i64,
    /// Task needs a GPU.
    pub requires_gpu: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Launch time.
    pub started_at: Option<DateTime<Utc>>,
    /// End time.
    pub ended_at: Option<DateTime<Utc>>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Exit code.
    pub return_code: Option<i32>,
    /// Captured output location.
    pub log_path: Option<String>,
    /// Free-text outcome.
    pub result: Option<String>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            command: task.command,
            state: task.state,
            priority: task.priority,
            requires_gpu: task.requires_gpu,
            created_at: task.created_at,
            started_at: task.started_at,
            ended_at: task.ended_at,
            pid: task.pid,
            return_code: task.return_code,
            log_path: task.log_path,
            result: task.result,
        }
    }
}

/// Cancel payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Task to cancel.
    pub task_id: String,
}

/// Cancel result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Whether the cancellation applied (for running tasks: whether the
    /// terminate request was delivered).
    pub canceled: bool,
}

/// Policy activation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySetRequest {
    /// Policy name.
    pub name: String,
    /// Rule mapping; missing keys take defaults.
    #[serde(default)]
    pub rules: serde_json::Value,
}

/// Policy activation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySetResponse {
    /// Name of the now-active policy.
    pub active: String,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Tick loop is active.
    pub loop_running: bool,
    /// Heap depth.
    pub queue_depth: usize,
    /// Live processes.
    pub running_tasks: usize,
}

/// Submit a task.
pub fn enqueue(scheduler: &Scheduler, req: EnqueueRequest) -> Result<EnqueueResponse, SchedulerError> {
    let task = scheduler.enqueue(req.into())?;
    Ok(EnqueueResponse {
        task_id: task.id,
        state: task.state,
    })
}

/// List tasks; `state` is `"any"`, empty, or a state name.
pub fn list_tasks(scheduler: &Scheduler, state: &str) -> Result<Vec<TaskView>, SchedulerError> {
    let filter: StateFilter = state.parse()?;
    Ok(scheduler.list(filter)?.into_iter().map(TaskView::from).collect())
}

/// Cancel a task.
pub fn cancel(scheduler: &Scheduler, req: &CancelRequest) -> Result<CancelResponse, SchedulerError> {
    Ok(CancelResponse {
        canceled: scheduler.cancel(&req.task_id)?,
    })
}

/// Activate a policy from a JSON rule mapping.
pub fn policy_set(
    scheduler: &Scheduler,
    req: PolicySetRequest,
) -> Result<PolicySetResponse, SchedulerError> {
    let rules = if req.rules.is_null() {
        Rules::default()
    } else {
        Rules::from_json(req.rules)?
    };
    Ok(PolicySetResponse {
        active: scheduler.policy_set(&req.name, rules)?,
    })
}

/// Dry-run plan for every queued task.
pub fn simulate(
    scheduler: &Scheduler,
    what_if: Option<WhatIf>,
) -> Result<SimulationPlan, SchedulerError> {
    scheduler.simulate(&what_if.unwrap_or_default())
}

/// Return a health payload.
pub fn health(scheduler: &Scheduler) -> Health {
    Health {
        ok: true,
        loop_running: scheduler.is_running(),
        queue_depth: scheduler.queue_len(),
        running_tasks: scheduler.running_count(),
    }
}
