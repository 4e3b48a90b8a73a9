//! Slot registry, admission gate, conflict resolution, and the apply pool built on them.

pub mod apply_pool;
pub mod audit;
pub mod error;
pub mod job_queue;
pub mod policy;
pub mod slot;
pub mod waiters;

pub use apply_pool::{
    ApplyPool, ApplyQueue, ApplyStats, JobExecutor, Sequenced, SequencedPolicy,
};
pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, build_audit_event};
pub use error::{AppResult, ApplyError, QueueError};
pub use job_queue::{JobQueue, MAX_SLOTS, QueueStats};
pub use policy::{ConflictPolicy, FnPolicy};
pub use slot::{JobKind, SlotHandle, SlotId, SlotState};
pub use waiters::WaiterSet;
