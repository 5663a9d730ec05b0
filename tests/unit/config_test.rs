//! Tests for configuration validation

use std::path::PathBuf;

use prometheus_local_scheduler::config::SchedulerConfig;

#[test]
fn test_defaults_are_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_parallel, 2);
    assert_eq!(config.default_policy, "balanced_defaults");
    assert_eq!(config.queue_check_interval_secs, 5);
    assert_eq!(config.max_log_bytes(), 10 * 1024 * 1024);
    assert!(config.enable_auto_start);
}

#[test]
fn test_invalid_max_parallel() {
    let invalid = SchedulerConfig {
        max_parallel: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_invalid_interval() {
    let invalid = SchedulerConfig {
        queue_check_interval_secs: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_unknown_default_policy() {
    let invalid = SchedulerConfig {
        default_policy: "turbo".into(),
        ..SchedulerConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("turbo"));
}

#[test]
fn test_from_json_partial() {
    let json = r#"{
        "max_parallel": 4,
        "default_policy": "sip-battery",
        "log_dir": "/var/tmp/jobs"
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_parallel, 4);
    assert_eq!(config.default_policy, "sip-battery");
    assert_eq!(config.log_dir, PathBuf::from("/var/tmp/jobs"));
    assert_eq!(config.queue_check_interval_secs, 5);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"max_parallel": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_env_overrides() {
    // Only this test touches SCHEDULER_* variables.
    std::env::set_var("SCHEDULER_MAX_PARALLEL", "3");
    std::env::set_var("SCHEDULER_ENABLE_AUTO_START", "false");
    std::env::set_var("SCHEDULER_STATE_PATH", "/tmp/sched/state.json");

    let mut config = SchedulerConfig::default();
    config.apply_env().unwrap();
    assert_eq!(config.max_parallel, 3);
    assert!(!config.enable_auto_start);
    assert_eq!(config.state_path, PathBuf::from("/tmp/sched/state.json"));

    std::env::set_var("SCHEDULER_MAX_PARALLEL", "many");
    let err = SchedulerConfig::default().apply_env().unwrap_err();
    assert!(err.contains("SCHEDULER_MAX_PARALLEL"));

    std::env::remove_var("SCHEDULER_MAX_PARALLEL");
    std::env::remove_var("SCHEDULER_ENABLE_AUTO_START");
    std::env::remove_var("SCHEDULER_STATE_PATH");
}
