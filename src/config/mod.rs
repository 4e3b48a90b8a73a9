//! Configuration models for job queues and apply pools.

pub mod queue;

pub use queue::{ApplyPoolConfig, QueueConfig};
