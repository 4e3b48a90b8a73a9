//! Tests for configuration validation

use prometheus_job_queue::config::queue::{ENV_CAPACITY, ENV_MAX_CONCURRENT};
use prometheus_job_queue::config::{ApplyPoolConfig, QueueConfig};
use prometheus_job_queue::core::{JobKind, MAX_SLOTS};

#[test]
fn test_queue_config_validation() {
    let valid = QueueConfig {
        max_concurrent: 4,
        capacity: 16,
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_queue_config_invalid_capacity() {
    let zero = QueueConfig {
        max_concurrent: 1,
        capacity: 0,
    };
    assert!(zero.validate().is_err());

    let too_big = QueueConfig {
        max_concurrent: 1,
        capacity: MAX_SLOTS + 1,
    };
    assert!(too_big.validate().is_err());
}

#[test]
fn test_queue_config_invalid_max_concurrent() {
    let zero = QueueConfig {
        max_concurrent: 0,
        capacity: 16,
    };
    assert!(zero.validate().is_err());

    let over_capacity = QueueConfig {
        max_concurrent: 17,
        capacity: 16,
    };
    let err = over_capacity.validate().unwrap_err();
    assert!(err.contains("max_concurrent"));
}

#[test]
fn test_queue_config_from_json() {
    let config = QueueConfig::from_json_str(r#"{ "max_concurrent": 3 }"#).unwrap();
    assert_eq!(config.max_concurrent, 3);
    assert_eq!(config.capacity, MAX_SLOTS);

    let err = QueueConfig::from_json_str(r#"{ "max_concurrent": 3, "capacity": 2 }"#).unwrap_err();
    assert!(err.contains("max_concurrent"));

    let err = QueueConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_apply_pool_config_from_json() {
    let json = r#"{
        "queue": { "max_concurrent": 2, "capacity": 8 },
        "worker_count": 6,
        "kind": 7
    }"#;
    let config = ApplyPoolConfig::from_json_str(json).unwrap();
    assert_eq!(config.worker_count, 6);
    assert_eq!(config.effective_workers(), 2);
    assert_eq!(config.kind, JobKind(7));
    assert_eq!(config.thread_stack_size, 2 * 1024 * 1024);
}

#[test]
fn test_apply_pool_config_invalid_stack() {
    let config = ApplyPoolConfig::new()
        .with_worker_count(2)
        .with_thread_stack_size(1024);
    assert!(config.validate().is_err());
}

#[test]
fn test_apply_pool_config_zero_workers() {
    let config = ApplyPoolConfig {
        worker_count: 0,
        ..ApplyPoolConfig::new().with_worker_count(1)
    };
    assert!(config.validate().is_err());
}

// Only test in this binary that touches the process environment.
#[test]
fn test_queue_config_from_env() {
    std::env::set_var(ENV_CAPACITY, "32");
    std::env::set_var(ENV_MAX_CONCURRENT, "5");
    let config = QueueConfig::from_env().unwrap();
    assert_eq!(config.capacity, 32);
    assert_eq!(config.max_concurrent, 5);

    std::env::set_var(ENV_MAX_CONCURRENT, "many");
    let err = QueueConfig::from_env().unwrap_err();
    assert!(err.to_string().contains(ENV_MAX_CONCURRENT));

    std::env::set_var(ENV_MAX_CONCURRENT, "64");
    assert!(QueueConfig::from_env().is_err());

    std::env::remove_var(ENV_MAX_CONCURRENT);
    let config = QueueConfig::from_env().unwrap();
    assert!(config.max_concurrent <= 32);

    std::env::remove_var(ENV_CAPACITY);
}
