//! Tests for the scheduler builder

use std::sync::Arc;

use prometheus_local_scheduler::builders::SchedulerBuilder;
use prometheus_local_scheduler::config::SchedulerConfig;
use prometheus_local_scheduler::core::{SchedulerError, SystemSnapshot, TaskSpec};
use prometheus_local_scheduler::infra::{InMemoryStore, StaticMetrics};

fn metrics() -> Arc<StaticMetrics> {
    Arc::new(StaticMetrics::new(SystemSnapshot::idle(8 << 30)))
}

#[test]
fn test_build_requires_metrics() {
    let result = SchedulerBuilder::from_config(SchedulerConfig::default())
        .store(Arc::new(InMemoryStore::new()))
        .build();
    assert!(matches!(result, Err(SchedulerError::Config(_))));
}

#[test]
fn test_build_rejects_invalid_config() {
    let config = SchedulerConfig {
        max_parallel: 0,
        ..SchedulerConfig::default()
    };
    let result = SchedulerBuilder::from_config(config).metrics(metrics()).build();
    assert!(matches!(result, Err(SchedulerError::Config(_))));
}

#[test]
fn test_build_with_default_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = SchedulerConfig {
        state_path: dir.path().join("state").join("scheduler.json"),
        log_dir: dir.path().join("logs"),
        ..SchedulerConfig::default()
    };

    let task_id = {
        let scheduler = SchedulerBuilder::from_config(config.clone())
            .metrics(metrics())
            .build()
            .unwrap();
        scheduler.enqueue(TaskSpec::new("persisted", "true")).unwrap().id
    };
    assert!(config.state_path.exists());

    let reopened = SchedulerBuilder::from_config(config)
        .metrics(metrics())
        .build()
        .unwrap();
    assert!(reopened.task(&task_id).unwrap().is_some());
    assert_eq!(reopened.queue_len(), 1);
}

#[tokio::test]
async fn test_build_with_auto_start() {
    let config = SchedulerConfig {
        queue_check_interval_secs: 60,
        ..SchedulerConfig::default()
    };
    let spawner = prometheus_local_scheduler::runtime::TokioSpawner::current();
    let scheduler = SchedulerBuilder::from_config(config)
        .metrics(metrics())
        .store(Arc::new(InMemoryStore::new()))
        .build_with(&spawner)
        .unwrap();
    assert!(scheduler.is_running());
    scheduler.stop();
    assert!(!scheduler.is_running());
}
