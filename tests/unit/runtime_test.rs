//! Tests for the tokio spawner and the API wrappers

use std::sync::Arc;

use prometheus_local_scheduler::config::SchedulerConfig;
use prometheus_local_scheduler::core::{Scheduler, Spawn, SystemSnapshot, TaskState};
use prometheus_local_scheduler::infra::{InMemoryStore, StaticMetrics};
use prometheus_local_scheduler::runtime::api::{self, CancelRequest, EnqueueRequest, PolicySetRequest};
use prometheus_local_scheduler::runtime::{LocalProcessRunner, TokioSpawner};

fn scheduler() -> Scheduler {
    Scheduler::new(
        SchedulerConfig::default(),
        Arc::new(InMemoryStore::new()),
        Arc::new(StaticMetrics::new(SystemSnapshot::idle(8 << 30))),
        Arc::new(LocalProcessRunner::default()),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_try_current_outside_runtime() {
    assert!(TokioSpawner::try_current().is_none());
}

#[test]
fn test_enqueue_request_defaults() {
    let req: EnqueueRequest = serde_json::from_str(r#"{"command": "make"}"#).unwrap();
    assert_eq!(req.name, "task");
    assert_eq!(req.priority, 5);
    assert_eq!(req.max_cpu_pct, 90);
    assert!(!req.requires_gpu);
}

#[test]
fn test_api_round_trip() {
    let sched = scheduler();
    let req: EnqueueRequest =
        serde_json::from_str(r#"{"name": "etl", "command": "python etl.py", "priority": 2}"#).unwrap();
    let created = api::enqueue(&sched, req).unwrap();
    assert_eq!(created.state, TaskState::Queued);

    let queued = api::list_tasks(&sched, "queued").unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, created.task_id);
    assert_eq!(queued[0].priority, 2);
    assert_eq!(api::list_tasks(&sched, "any").unwrap().len(), 1);
    assert!(api::list_tasks(&sched, "running").unwrap().is_empty());
    assert!(api::list_tasks(&sched, "paused").is_err());

    let plan = api::simulate(&sched, None).unwrap();
    assert_eq!(plan.entries.len(), 1);

    let canceled = api::cancel(
        &sched,
        &CancelRequest {
            task_id: created.task_id.clone(),
        },
    )
    .unwrap();
    assert!(canceled.canceled);
    assert_eq!(api::list_tasks(&sched, "canceled").unwrap().len(), 1);

    let health = api::health(&sched);
    assert!(health.ok);
    assert!(!health.loop_running);
}

#[test]
fn test_api_rejects_empty_command() {
    let sched = scheduler();
    let req: EnqueueRequest = serde_json::from_str(r#"{"command": ""}"#).unwrap();
    assert!(api::enqueue(&sched, req).is_err());
}

#[test]
fn test_policy_set_from_json() {
    let sched = scheduler();
    let resp = api::policy_set(
        &sched,
        PolicySetRequest {
            name: "night-owl".into(),
            rules: serde_json::json!({
                "cpu_max_pct": 60,
                "quiet_hours": {"start": "23:00", "end": "06:00", "allow_if_plugged": false}
            }),
        },
    )
    .unwrap();
    assert_eq!(resp.active, "night-owl");
    let active = sched.active_policy().unwrap().unwrap();
    assert_eq!(active.rules.cpu_max_pct, 60);
    assert!(!active.rules.quiet_hours.unwrap().allow_if_plugged);

    let bad = api::policy_set(
        &sched,
        PolicySetRequest {
            name: "bad".into(),
            rules: serde_json::json!({"battery_min_pct": 140}),
        },
    );
    assert!(bad.is_err());
    assert_eq!(sched.active_policy().unwrap().unwrap().name, "night-owl");
}
