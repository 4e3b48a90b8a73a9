//! Builder assembling a job queue from configuration.

use crate::config::QueueConfig;
use crate::core::{AuditSink, ConflictPolicy, JobQueue, QueueError};

/// Collects configuration and an optional audit sink, then builds a [`JobQueue`].
///
/// ```
/// use prometheus_job_queue::builders::JobQueueBuilder;
/// use prometheus_job_queue::core::{FnPolicy, JobQueue};
///
/// let queue: JobQueue<u64, _> = JobQueueBuilder::new()
///     .with_max_concurrent(4)
///     .with_capacity(64)
///     .build(FnPolicy::new(|a: &u64, b: &u64| a == b, |a: &u64, b: &u64| a.cmp(b)))?;
/// assert_eq!(queue.capacity(), 64);
/// # Ok::<(), prometheus_job_queue::core::QueueError>(())
/// ```
#[derive(Default)]
pub struct JobQueueBuilder {
    config: QueueConfig,
    audit: Option<Box<dyn AuditSink>>,
}

impl JobQueueBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: QueueConfig) -> Self {
        Self {
            config,
            audit: None,
        }
    }

    /// Set the admission ceiling.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    /// Set the slot table size.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Record lifecycle transitions into `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration and build the queue.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidConfig` if the configuration does not validate.
    pub fn build<C, P>(self, policy: P) -> Result<JobQueue<C, P>, QueueError>
    where
        P: ConflictPolicy<C>,
    {
        self.config.validate().map_err(QueueError::InvalidConfig)?;

        let queue =
            JobQueue::with_capacity(self.config.capacity, self.config.max_concurrent, policy);
        Ok(match self.audit {
            Some(audit) => queue.with_audit(audit),
            None => queue,
        })
    }
}

impl std::fmt::Debug for JobQueueBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueueBuilder")
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}
