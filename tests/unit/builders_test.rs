//! Tests for builder modules

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_job_queue::builders::JobQueueBuilder;
use prometheus_job_queue::config::QueueConfig;
use prometheus_job_queue::core::{
    AuditAction, FnPolicy, InMemoryAuditSink, JobKind, JobQueue, QueueError,
};

type Conflict = fn(&u32, &u32) -> bool;
type Order = fn(&u32, &u32) -> std::cmp::Ordering;

fn policy() -> FnPolicy<Conflict, Order> {
    let conflict: Conflict = |a, b| a == b;
    let order: Order = |a, b| a.cmp(b);
    FnPolicy::new(conflict, order)
}

#[test]
fn test_queue_builder_from_config() {
    let config = QueueConfig {
        max_concurrent: 3,
        capacity: 12,
    };
    let queue: JobQueue<u32, _> = JobQueueBuilder::from_config(config).build(policy()).unwrap();
    assert_eq!(queue.capacity(), 12);
    assert_eq!(queue.max_concurrent(), 3);
    assert_eq!(queue.stats().registered, 0);
}

#[test]
fn test_queue_builder_rejects_invalid_config() {
    let err = JobQueueBuilder::new()
        .with_capacity(4)
        .with_max_concurrent(5)
        .build::<u32, _>(policy())
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidConfig(_)));
}

#[test]
fn test_queue_builder_with_audit() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(16)));
    let queue: JobQueue<u32, _> = JobQueueBuilder::new()
        .with_capacity(2)
        .with_max_concurrent(1)
        .with_audit(Box::new(Arc::clone(&sink)))
        .build(policy())
        .unwrap();

    let slot = queue.acquire_slot(JobKind(9)).unwrap();
    queue.release_slot(slot);

    let events = sink.lock().events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, JobKind(9));
    assert_eq!(events[1].action, AuditAction::Released);
}
