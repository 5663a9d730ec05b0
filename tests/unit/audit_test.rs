//! Tests for audit events and their persistence

use prometheus_local_scheduler::core::{EventKind, ScheduleEvent, Task, TaskSpec, TaskState};
use prometheus_local_scheduler::infra::{InMemoryStore, TaskStore};
use prometheus_local_scheduler::util::utc_now;

#[test]
fn test_event_serializes_with_lowercase_kind() {
    let event = ScheduleEvent::new(EventKind::Canceled, "T-1", "Canceled while queued");
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "canceled");
    assert_eq!(json["task_id"], "T-1");
    assert_eq!(json["note"], "Canceled while queued");
}

#[test]
fn test_events_filtered_and_ordered() {
    let store = InMemoryStore::new();
    for id in ["T-1", "T-2"] {
        let task = Task::from_spec(id.into(), TaskSpec::new(id, "true"), utc_now());
        store
            .insert_task(&task, ScheduleEvent::new(EventKind::Enqueued, id, id))
            .unwrap();
    }
    store
        .transition(
            "T-1",
            &[TaskState::Queued],
            &mut |t: &mut Task| t.state = TaskState::Canceled,
            ScheduleEvent::new(EventKind::Canceled, "T-1", ""),
        )
        .unwrap()
        .unwrap();

    let all = store.events(None).unwrap();
    assert_eq!(all.len(), 3);
    let kinds: Vec<EventKind> = store
        .events(Some("T-1"))
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EventKind::Enqueued, EventKind::Canceled]);
}

#[test]
fn test_rejected_transition_appends_nothing() {
    let store = InMemoryStore::new();
    let task = Task::from_spec("T-1".into(), TaskSpec::new("t", "true"), utc_now());
    store
        .insert_task(&task, ScheduleEvent::new(EventKind::Enqueued, "T-1", ""))
        .unwrap();

    let moved = store
        .transition(
            "T-1",
            &[TaskState::Running],
            &mut |t: &mut Task| t.state = TaskState::Done,
            ScheduleEvent::new(EventKind::Finished, "T-1", "rc=0"),
        )
        .unwrap();
    assert!(moved.is_none());
    assert_eq!(store.events(None).unwrap().len(), 1);
    assert_eq!(store.task("T-1").unwrap().unwrap().state, TaskState::Queued);
}
