//! Async adapters for driving a [`JobQueue`](crate::core::JobQueue) from a tokio runtime.

pub mod tokio_adapter;

pub use tokio_adapter::{start_async, start_registered_async};
