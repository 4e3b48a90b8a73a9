//! Tests for utility helpers

use prometheus_job_queue::util::{init_tracing, init_tracing_with, now_ms};

#[test]
fn test_now_ms_advances() {
    let first = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(first > 0);
    assert!(now_ms() >= first);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing_with("prometheus_job_queue=debug");
    init_tracing();
    init_tracing_with("off");
    tracing::debug!("telemetry installed");
}
