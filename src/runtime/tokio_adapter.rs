//! Tokio adapter for the blocking job queue calls.
//!
//! `start` may park its thread for as long as a conflicting job runs, which must never
//! happen on an async worker. These helpers move the call onto tokio's blocking pool and
//! hand the slot back when it returns. `end` and `release_slot` never park and are called
//! directly.

use std::panic;
use std::sync::Arc;

use tokio::task::{self, JoinError};
use tracing::{debug, warn};

use crate::core::{ConflictPolicy, JobQueue, QueueError, SlotHandle};

/// Start `ctx` on `slot` without blocking the async runtime.
///
/// # Errors
///
/// - `QueueError::InvalidState` as for [`JobQueue::start`]
/// - `QueueError::Interrupted` if the blocking task was cancelled
pub async fn start_async<C, P>(
    queue: Arc<JobQueue<C, P>>,
    slot: SlotHandle,
    ctx: C,
) -> Result<SlotHandle, QueueError>
where
    C: Send + 'static,
    P: ConflictPolicy<C> + 'static,
{
    debug!(slot = %slot.id(), "offloading job start to blocking pool");
    match task::spawn_blocking(move || queue.start(&slot, ctx).map(|()| slot)).await {
        Ok(result) => result,
        Err(e) => Err(interrupted(e, "start")),
    }
}

/// Start a registered slot without blocking the async runtime.
///
/// # Errors
///
/// - `QueueError::InvalidState` as for [`JobQueue::start_registered`]
/// - `QueueError::Interrupted` if the blocking task was cancelled
pub async fn start_registered_async<C, P>(
    queue: Arc<JobQueue<C, P>>,
    slot: SlotHandle,
) -> Result<SlotHandle, QueueError>
where
    C: Send + 'static,
    P: ConflictPolicy<C> + 'static,
{
    debug!(slot = %slot.id(), "offloading registered job start to blocking pool");
    match task::spawn_blocking(move || queue.start_registered(&slot).map(|()| slot)).await {
        Ok(result) => result,
        Err(e) => Err(interrupted(e, "start_registered")),
    }
}

/// Panics from the blocking call are resumed on the caller; cancellation becomes an error.
fn interrupted(e: JoinError, op: &str) -> QueueError {
    if e.is_panic() {
        panic::resume_unwind(e.into_panic());
    }
    warn!(op, error = %e, "blocking job queue call did not complete");
    QueueError::Interrupted(format!("{op}: {e}"))
}
