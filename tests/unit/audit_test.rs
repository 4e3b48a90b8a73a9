//! Tests for audit sink

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_job_queue::core::{
    AuditAction, AuditSink, FnPolicy, InMemoryAuditSink, JobKind, JobQueue, build_audit_event,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let queue = JobQueue::create(1, |_: &u8, _: &u8| false, |a: &u8, b: &u8| a.cmp(b));
    let slot = queue.acquire_slot(JobKind(4)).unwrap();

    sink.record(build_audit_event(slot.id(), slot.kind(), AuditAction::Acquired));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].slot, slot.id());
    assert_eq!(events[0].kind, JobKind(4));
    assert_eq!(events[0].action, AuditAction::Acquired);
    assert!(events[0].created_at_ms > 0);

    queue.release_slot(slot);
}

#[test]
fn test_queue_records_capacity_handoff() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(64)));
    let queue: JobQueue<u8, _> = JobQueue::new(
        1,
        FnPolicy::new(|_: &u8, _: &u8| false, |a: &u8, b: &u8| a.cmp(b)),
    )
    .with_audit(Box::new(Arc::clone(&sink)));

    let a = queue.acquire_slot(JobKind(0)).unwrap();
    let b = queue.acquire_slot(JobKind(0)).unwrap();
    queue.start(&a, 1).unwrap();

    std::thread::scope(|s| {
        let waiter = s.spawn(|| queue.start(&b, 2));
        while queue.stats().waiting_for_capacity == 0 {
            std::thread::yield_now();
        }
        queue.end(&a).unwrap();
        waiter.join().unwrap().unwrap();
    });

    assert_eq!(
        sink.lock().actions_for(b.id()),
        vec![
            AuditAction::Acquired,
            AuditAction::ParkedForCapacity,
            AuditAction::Readmitted,
            AuditAction::Started,
        ]
    );

    let b_id = b.id();
    queue.end(&b).unwrap();
    queue.release_slot(a);
    queue.release_slot(b);
    assert_eq!(
        sink.lock().actions_for(b_id).last(),
        Some(&AuditAction::Released)
    );
}

#[test]
fn test_audit_sink_overflow() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(2)));
    let queue = JobQueue::create(1, |_: &u8, _: &u8| false, |a: &u8, b: &u8| a.cmp(b))
        .with_audit(Box::new(Arc::clone(&sink)));

    let slot = queue.acquire_slot(JobKind(0)).unwrap();
    queue.start(&slot, 1).unwrap();
    queue.end(&slot).unwrap();

    let events = sink.lock().events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AuditAction::Started); // Acquired popped
    assert_eq!(events[1].action, AuditAction::Ended);

    queue.release_slot(slot);
}
