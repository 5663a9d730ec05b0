//! Append-only schedule audit events.
//!
//! Events are written through the durable store in the same commit as the task
//! mutation they describe, and mirrored to `tracing` for live observability.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::clock::utc_now;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Task accepted into the queue.
    Enqueued,
    /// Process launched.
    Started,
    /// Process exited with code 0.
    Finished,
    /// Process exited non-zero, failed to launch, or was lost.
    Failed,
    /// Task canceled by a caller.
    Canceled,
    /// Admission denied; task stays queued.
    Deferred,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enqueued => "enqueued",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Deferred => "deferred",
        };
        f.write_str(name)
    }
}

/// Audit event structure. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    /// Event time.
    pub ts: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
    /// Related task identifier.
    pub task_id: String,
    /// Free-text context (command, reasons, exit code).
    pub note: Option<String>,
}

impl ScheduleEvent {
    /// Build an event stamped with the current time.
    pub fn new(kind: EventKind, task_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self::at(utc_now(), kind, task_id, note)
    }

    /// Build an event stamped with `ts`.
    pub fn at(
        ts: DateTime<Utc>,
        kind: EventKind,
        task_id: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        let note = note.into();
        Self {
            ts,
            kind,
            task_id: task_id.into(),
            note: (!note.is_empty()).then_some(note),
        }
    }

    /// Mirror the event to the tracing subscriber.
    pub fn trace(&self) {
        let note = self.note.as_deref().unwrap_or("");
        match self.kind {
            EventKind::Failed => {
                tracing::warn!(task_id = %self.task_id, kind = %self.kind, note, "schedule event");
            }
            EventKind::Deferred => {
                tracing::debug!(task_id = %self.task_id, kind = %self.kind, note, "schedule event");
            }
            _ => {
                tracing::info!(task_id = %self.task_id, kind = %self.kind, note, "schedule event");
            }
        }
    }
}
