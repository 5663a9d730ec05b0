//! File-backed store.
//!
//! Tasks and policies live in one JSON document. Every mutation is applied to
//! a copy, written to a temporary file next to the target, and renamed into
//! place; memory is only updated after the rename succeeds, so a failed write
//! leaves both unchanged.
//!
//! Audit events go to a sibling JSON-lines file (`state.json` ->
//! `state.events.jsonl`), one appended line per event, so the cost of a write
//! does not grow with history.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;

use super::{StoreState, TaskStore};
use crate::core::{PolicyRecord, Rules, ScheduleEvent, SchedulerError, StateFilter, Task, TaskState};

fn io_err(path: &Path, e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::Store(format!("{}: {e}", path.display()))
}

/// On-disk shape of the state document.
#[derive(Serialize)]
struct Snapshot<'a> {
    tasks: &'a BTreeMap<String, Task>,
    policies: &'a BTreeMap<String, PolicyRecord>,
}

/// Durable store backed by a JSON document and a JSON-lines event log.
pub struct FileStore {
    path: PathBuf,
    events_path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open (or create) the store at `path`, loading any existing contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let events_path = path.with_extension("events.jsonl");
        let mut state = Self::load_snapshot(&path)?;
        state.events.extend(Self::load_events(&events_path)?);
        tracing::debug!(
            path = %path.display(),
            tasks = state.tasks.len(),
            events = state.events.len(),
            policies = state.policies.len(),
            "opened file store"
        );
        Ok(Self {
            path,
            events_path,
            state: Mutex::new(state),
        })
    }

    /// Location of the state document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the event log.
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    fn load_snapshot(path: &Path) -> Result<StoreState, SchedulerError> {
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| io_err(path, e))
    }

    fn load_events(path: &Path) -> Result<Vec<ScheduleEvent>, SchedulerError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_err(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                // A crash mid-append leaves a torn final line.
                Err(e) => tracing::warn!(path = %path.display(), line = n + 1, error = %e, "skipping unreadable event"),
            }
        }
        Ok(events)
    }

    fn write_snapshot(&self, state: &StoreState) -> Result<(), SchedulerError> {
        let tmp = self.path.with_extension("json.tmp");
        let snapshot = Snapshot {
            tasks: &state.tasks,
            policies: &state.policies,
        };
        let body = serde_json::to_vec(&snapshot).map_err(|e| io_err(&tmp, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| io_err(&tmp, e))?;
        file.write_all(&body).map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        drop(file);
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
    }

    fn append_events(&self, events: &[ScheduleEvent]) -> Result<(), SchedulerError> {
        if events.is_empty() {
            return Ok(());
        }
        let path = &self.events_path;
        let mut body = Vec::new();
        for event in events {
            serde_json::to_writer(&mut body, event).map_err(|e| io_err(path, e))?;
            body.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        file.write_all(&body).map_err(|e| io_err(path, e))?;
        file.sync_data().map_err(|e| io_err(path, e))
    }

    /// Run `f` against a copy of the tasks and policies, persist the document,
    /// then append the events `f` recorded.
    ///
    /// The document is authoritative: once it is renamed into place the change
    /// is committed in memory even if the event append fails, which is only
    /// logged.
    fn commit<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<R, SchedulerError>,
    ) -> Result<R, SchedulerError> {
        let mut guard = self.state.lock();
        let mut next = StoreState {
            tasks: guard.tasks.clone(),
            events: Vec::new(),
            policies: guard.policies.clone(),
        };
        let out = f(&mut next)?;
        self.write_snapshot(&next)?;
        if let Err(e) = self.append_events(&next.events) {
            tracing::warn!(error = %e, dropped = next.events.len(), "failed to append audit events");
        }
        guard.tasks = next.tasks;
        guard.policies = next.policies;
        guard.events.append(&mut next.events);
        Ok(out)
    }
}

impl TaskStore for FileStore {
    fn insert_task(&self, task: &Task, event: ScheduleEvent) -> Result<(), SchedulerError> {
        self.commit(|state| state.insert_task(task, event))
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
        {
            let state = self.state.lock();
            match state.tasks.get(id) {
                Some(task) if allowed_from.contains(&task.state) => {}
                _ => return Ok(None),
            }
        }
        self.commit(|state| Ok(state.transition(id, allowed_from, apply, event)))
    }

    fn events(&self, task_id: Option<&str>) -> Result<Vec<ScheduleEvent>, SchedulerError> {
        Ok(self.state.lock().events(task_id))
    }

    fn activate_policy(&self, name: &str, rules: &Rules) -> Result<PolicyRecord, SchedulerError> {
        self.commit(|state| Ok(state.activate_policy(name, rules)))
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
