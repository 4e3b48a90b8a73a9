//! # Prometheus Job Queue
//!
//! A bounded job-admission and conflict-ordering queue for parallel apply pipelines.
//!
//! Many workers want to run units of work at once, but some units must not overlap: two
//! jobs touching the same table, account, or file have to run one after the other. This
//! crate gives each worker a slot, lets at most `max_concurrent` of them hold a seat at a
//! time, and parks a starting job on any live job it conflicts with until that job ends.
//!
//! ## Key Features
//!
//! - **Slot Registry**: Fixed table of slots, acquired and released without blocking
//! - **Admission Gate**: Seats handed to the least waiter by a caller-supplied order
//! - **Conflict Ordering**: Caller-supplied predicate decides which jobs must serialize
//! - **Registration**: Announce a job early so later jobs see it before it starts
//! - **Apply Pool**: Worker threads applying submitted jobs in parallel, conflicts in order
//! - **Diagnostics**: Statistics, wait-for cycle detection, and an audit journal
//!
//! ## JobQueue - Blocking Start/End
//!
//! ```rust
//! use prometheus_job_queue::core::{JobKind, JobQueue};
//!
//! // Jobs on the same key conflict; lower keys are admitted first.
//! let queue = JobQueue::create(4, |a: &u32, b: &u32| a == b, |a: &u32, b: &u32| a.cmp(b));
//!
//! let slot = queue.acquire_slot(JobKind(1))?;
//! queue.start(&slot, 7)?;
//! // ... apply the job ...
//! let job = queue.end(&slot)?;
//! assert_eq!(job, 7);
//! queue.release_slot(slot);
//! # Ok::<(), prometheus_job_queue::core::QueueError>(())
//! ```
//!
//! ## ApplyPool - Parallel Apply
//!
//! ```rust,no_run
//! use prometheus_job_queue::config::ApplyPoolConfig;
//! use prometheus_job_queue::core::{AppResult, ApplyPool};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ApplyPool::new(
//!     ApplyPoolConfig::new().with_worker_count(4),
//!     |a: &String, b: &String| a == b,
//!     |_seqno: u64, table: &String| -> AppResult<()> {
//!         println!("applying change to {table}");
//!         Ok(())
//!     },
//! )?;
//!
//! pool.submit("orders".to_string())?;
//! pool.submit("customers".to_string())?;
//! pool.wait_idle();
//! pool.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! For complete examples, see:
//! - `tests/job_queue_test.rs` - Queue scenarios and stress tests
//! - `tests/apply_pool_test.rs` - Apply pool integration tests

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Slot registry, admission gate, conflict resolution, and the apply pool.
pub mod core;
/// Configuration models for queues and apply pools.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Async runtime adapters.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
