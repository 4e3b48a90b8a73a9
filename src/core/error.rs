//! Error types for job queue operations.

use thiserror::Error;

use crate::core::slot::{SlotId, SlotState};

/// Errors produced by the job queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Every slot in the table is registered to a caller.
    #[error("job queue full: all {capacity} slots registered")]
    QueueFull {
        /// Number of slots in the table.
        capacity: usize,
    },
    /// The registered count says a slot is free but none was found.
    #[error("no free slot found with {registered} slots registered")]
    NoFreeSlot {
        /// Registered count at the time of the scan.
        registered: usize,
    },
    /// The slot is not in a state that allows the requested operation.
    #[error("slot {slot} in invalid state: {state}")]
    InvalidState {
        /// Slot the operation was called on.
        slot: SlotId,
        /// State the slot was found in.
        state: SlotState,
    },
    /// The queue was destroyed while slots were still allocated.
    #[error("{registered} slots still registered at destroy")]
    SlotsOutstanding {
        /// Slots that were never released.
        registered: usize,
    },
    /// Queue configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A blocking call was interrupted before it returned.
    #[error("blocking start interrupted: {0}")]
    Interrupted(String),
}

/// Errors produced by the apply pool.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Slot bookkeeping failed in the underlying queue.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// The pool has been shut down.
    #[error("apply pool has been shut down")]
    PoolShutdown,
    /// Pool configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be spawned.
    #[error("failed to spawn apply worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
