//! Core scheduling types, the seams to the outside world, and the scheduler.

pub mod admission;
pub mod audit;
pub mod error;
pub mod executor;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod snapshot;
pub mod task;

pub use admission::{evaluate, Admission};
pub use audit::{EventKind, ScheduleEvent};
pub use error::{AppResult, SchedulerError};
pub use executor::{task_log_path, ProcessHandle, ProcessLauncher, Spawn};
pub use policy::{
    preset, presets, ClockTime, PolicyRecord, QuietHours, Rules, DEFAULT_PRESET, PRESET_NAMES,
};
pub use queue::{QueueItem, TaskQueue};
pub use scheduler::{
    PlanEntry, Scheduler, SchedulerStats, SimulationPlan, TickReport, WhatIf, ORPHAN_NOTE,
};
pub use snapshot::{GpuState, MetricsProvider, PowerState, SystemSnapshot};
pub use task::{ResourceEnvelope, StateFilter, Task, TaskSpec, TaskState};
