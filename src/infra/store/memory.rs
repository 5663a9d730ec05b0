//! In-memory store and the state document shared with the file backend.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::TaskStore;
use crate::core::{PolicyRecord, Rules, ScheduleEvent, SchedulerError, StateFilter, Task, TaskState};
use crate::util::clock::utc_now;

/// Complete store contents. [`super::FileStore`] persists tasks and policies
/// as one document and the events as a separate JSON-lines log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    /// Tasks keyed by id.
    pub tasks: BTreeMap<String, Task>,
    /// Append-only audit log.
    #[serde(default)]
    pub events: Vec<ScheduleEvent>,
    /// Policies keyed by name.
    pub policies: BTreeMap<String, PolicyRecord>,
}

impl StoreState {
    pub(crate) fn insert_task(&mut self, task: &Task, event: ScheduleEvent) -> Result<(), SchedulerError> {
        if self.tasks.contains_key(&task.id) {
            return Err(SchedulerError::Store(format!("duplicate task id {}", task.id)));
        }
        self.tasks.insert(task.id.clone(), task.clone());
        self.events.push(event);
        Ok(())
    }

    pub(crate) fn tasks(&self, filter: StateFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| filter.matches(t.state))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub(crate) fn transition(
        &mut self,
        id: &str,
        allowed_from: &[TaskState],
        apply: &mut dyn FnMut(&mut Task),
        event: ScheduleEvent,
    ) -> Option<Task> {
        let task = self.tasks.get_mut(id)?;
        if !allowed_from.contains(&task.state) {
            return None;
        }
        apply(task);
        let updated = task.clone();
        self.events.push(event);
        Some(updated)
    }

    pub(crate) fn events(&self, task_id: Option<&str>) -> Vec<ScheduleEvent> {
        self.events
            .iter()
            .filter(|e| task_id.is_none_or(|id| e.task_id == id))
            .cloned()
            .collect()
    }

    pub(crate) fn activate_policy(&mut self, name: &str, rules: &Rules) -> PolicyRecord {
        for policy in self.policies.values_mut() {
            policy.active = false;
        }
        let record = PolicyRecord {
            name: name.to_string(),
            rules: rules.clone(),
            active: true,
            updated_at: utc_now(),
        };
        self.policies.insert(name.to_string(), record.clone());
        record
    }

    pub(crate) fn active_policy(&self) -> Option<PolicyRecord> {
        self.policies.values().find(|p| p.active).cloned()
    }
}

/// Simple in-memory store for development/testing. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with `state`.
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of the current contents.
    pub fn dump(&self) -> StoreState {
        self.state.lock().clone()
    }
}

impl TaskStore for InMemoryStore {
    fn insert_task(&self, task: &Task, event: ScheduleEvent) -> Result<(), SchedulerError> {
        self.state.lock().insert_task(task, event)
    }

    fn task(&self, id: &str) -> Result<Option<Task>, SchedulerError> {
        Ok(self.state.lock().tasks.get(id).cloned())
    }

    fn tasks(&self, filter: StateFilter) -> Result<Vec<Task>, SchedulerError> {
        Ok(self.state.lock().tasks(filter))
    }

    fn transition(
        &self,
        id: &str,
        allowed_from: &[TaskState],
        apply: &mut dyn FnMut(&mut Task),
        event: ScheduleEvent,
    ) -> Result<Option<Task>, SchedulerError> {
        Ok(self.state.lock().transition(id, allowed_from, apply, event))
    }

    fn events(&self, task_id: Option<&str>) -> Result<Vec<ScheduleEvent>, SchedulerError> {
        Ok(self.state.lock().events(task_id))
    }

    fn activate_policy(&self, name: &str, rules: &Rules) -> Result<PolicyRecord, SchedulerError> {
        Ok(self.state.lock().activate_policy(name, rules))
    }

    fn active_policy(&self) -> Result<Option<PolicyRecord>, SchedulerError> {
        Ok(self.state.lock().active_policy())
    }

    fn policy(&self, name: &str) -> Result<Option<PolicyRecord>, SchedulerError> {
        Ok(self.state.lock().policies.get(name).cloned())
    }

    fn policies(&self) -> Result<Vec<PolicyRecord>, SchedulerError> {
        Ok(self.state.lock().policies.values().cloned().collect())
    }
}
