//! Tests for utility helpers

use prometheus_local_scheduler::util::{init_tracing, task_id, utc_now};

#[test]
fn test_task_id_prefix() {
    let now = utc_now();
    let id = task_id(now);
    assert!(id.starts_with(&format!("T-{}", now.format("%Y%m%d"))));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
