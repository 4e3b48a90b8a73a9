//! Tests for error types

use prometheus_job_queue::core::{ApplyError, JobKind, JobQueue, QueueError, SlotState};

#[test]
fn test_queue_full_error() {
    let err = QueueError::QueueFull { capacity: 8 };
    assert_eq!(format!("{}", err), "job queue full: all 8 slots registered");
}

#[test]
fn test_invalid_state_error_names_slot_and_state() {
    let queue = JobQueue::create(1, |_: &u8, _: &u8| false, |a: &u8, b: &u8| a.cmp(b));
    let slot = queue.acquire_slot(JobKind(0)).unwrap();

    let err = queue.end(&slot).unwrap_err();
    assert_eq!(format!("{}", err), "slot #0 in invalid state: idle");
    queue.release_slot(slot);
}

#[test]
fn test_slots_outstanding_error() {
    let err = QueueError::SlotsOutstanding { registered: 3 };
    assert_eq!(format!("{}", err), "3 slots still registered at destroy");
}

#[test]
fn test_interrupted_error() {
    let err = QueueError::Interrupted("start: task was cancelled".to_string());
    assert_eq!(
        format!("{}", err),
        "blocking start interrupted: start: task was cancelled"
    );
}

#[test]
fn test_apply_error_wraps_queue_error() {
    let err: ApplyError = QueueError::QueueFull { capacity: 2 }.into();
    assert_eq!(format!("{}", err), "job queue full: all 2 slots registered");
    assert_eq!(format!("{}", ApplyError::PoolShutdown), "apply pool has been shut down");
}

#[test]
fn test_slot_state_display() {
    assert_eq!(SlotState::WaitingForCapacity.to_string(), "waiting_for_capacity");
    assert_eq!(SlotState::Void.to_string(), "void");
}
