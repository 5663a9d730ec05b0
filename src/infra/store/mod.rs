//! Durable store backends.
//!
//! The store is the single source of truth for task state; every call is
//! all-or-nothing.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{InMemoryStore, StoreState};

use crate::core::{PolicyRecord, Rules, ScheduleEvent, SchedulerError, StateFilter, Task, TaskState};

/// Persistence for tasks, audit events, and policies.
pub trait TaskStore: Send + Sync {
    /// Persist a new task together with its first audit event.
    fn insert_task(&self, task: &Task, event: ScheduleEvent) -> Result<(), SchedulerError>;

    /// Load a task by id.
    fn task(&self, id: &str) -> Result<Option<Task>, SchedulerError>;

    /// Tasks matching `filter`, in creation order.
    fn tasks(&self, filter: StateFilter) -> Result<Vec<Task>, SchedulerError>;

    /// Compare-and-set state change. When the task exists and its current
    /// state is in `allowed_from`, `apply` mutates it and `event` is appended in
    /// the same commit; the updated task is returned. Otherwise nothing changes
    /// and `None` is returned.
    fn transition(
        &self,
        id: &str,
        allowed_from: &[TaskState],
        apply: &mut dyn FnMut(&mut Task),
        event: ScheduleEvent,
    ) -> Result<Option<Task>, SchedulerError>;

    /// Audit events, optionally for one task, in append order.
    fn events(&self, task_id: Option<&str>) -> Result<Vec<ScheduleEvent>, SchedulerError>;

    /// Deactivate every policy, then create or update `name` with `rules` and
    /// mark it active.
    fn activate_policy(&self, name: &str, rules: &Rules) -> Result<PolicyRecord, SchedulerError>;

    /// The active policy, if one has been set.
    fn active_policy(&self) -> Result<Option<PolicyRecord>, SchedulerError>;

    /// Load a policy by name.
    fn policy(&self, name: &str) -> Result<Option<PolicyRecord>, SchedulerError>;

    /// All stored policies ordered by name.
    fn policies(&self) -> Result<Vec<PolicyRecord>, SchedulerError>;
}
