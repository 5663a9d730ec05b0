//! Tests for error types

use prometheus_local_scheduler::core::SchedulerError;

#[test]
fn test_validation_error() {
    let err = SchedulerError::Validation("command must not be empty".to_string());
    assert_eq!(format!("{}", err), "validation error: command must not be empty");
}

#[test]
fn test_unknown_preset_error() {
    let err = SchedulerError::UnknownPreset("turbo".to_string());
    assert_eq!(format!("{}", err), "unknown policy preset: turbo");
}

#[test]
fn test_launch_error() {
    let err = SchedulerError::Launch("nope: not found".to_string());
    assert_eq!(format!("{}", err), "launch failed: nope: not found");
}

#[test]
fn test_store_error() {
    let err = SchedulerError::Store("disk full".to_string());
    assert_eq!(format!("{}", err), "store error: disk full");
}

#[test]
fn test_into_anyhow() {
    let result: prometheus_local_scheduler::core::AppResult<()> =
        Err(SchedulerError::Metrics("sensor offline".into()).into());
    assert_eq!(result.unwrap_err().to_string(), "metrics error: sensor offline");
}
