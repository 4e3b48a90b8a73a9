//! Tests for the tokio adapter

use std::sync::Arc;
use std::time::Duration;

use prometheus_job_queue::core::{JobKind, JobQueue, SlotState};
use prometheus_job_queue::runtime::{start_async, start_registered_async};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_async_round_trip() {
    let queue = Arc::new(JobQueue::create(
        2,
        |a: &u32, b: &u32| a == b,
        |a: &u32, b: &u32| a.cmp(b),
    ));
    let slot = queue.acquire_slot(JobKind(0)).unwrap();

    let slot = start_async(Arc::clone(&queue), slot, 11).await.unwrap();
    assert_eq!(queue.state_of(&slot), SlotState::Running);

    assert_eq!(queue.end(&slot).unwrap(), 11);
    queue.release_slot(slot);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_async_waits_without_blocking_runtime() {
    let queue = Arc::new(JobQueue::create(
        2,
        |a: &u32, b: &u32| a == b,
        |a: &u32, b: &u32| a.cmp(b),
    ));
    let a = queue.acquire_slot(JobKind(0)).unwrap();
    let b = queue.acquire_slot(JobKind(0)).unwrap();
    let b_id = b.id();
    queue.start(&a, 1).unwrap();

    let pending = tokio::spawn(start_async(Arc::clone(&queue), b, 1));

    // The runtime keeps making progress while B is parked on A.
    let mut parked = false;
    for _ in 0..1000 {
        if queue.waiters_of(&a) == vec![b_id] {
            parked = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(parked, "B never parked on A");
    assert!(!pending.is_finished());

    queue.end(&a).unwrap();
    let b = pending.await.expect("join").expect("start B");
    assert_eq!(queue.state_of(&b), SlotState::Running);

    queue.end(&b).unwrap();
    queue.release_slot(a);
    queue.release_slot(b);
}

#[tokio::test]
async fn test_start_registered_async() {
    let queue = Arc::new(JobQueue::create(
        1,
        |_: &u32, _: &u32| false,
        |a: &u32, b: &u32| a.cmp(b),
    ));
    let slot = queue.acquire_slot(JobKind(0)).unwrap();
    queue.register(&slot, 4).unwrap();

    let slot = start_registered_async(Arc::clone(&queue), slot).await.unwrap();
    assert_eq!(queue.end(&slot).unwrap(), 4);
    queue.release_slot(slot);
}
