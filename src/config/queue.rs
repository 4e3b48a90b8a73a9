//! Queue and apply pool configuration structures.

use std::env;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::job_queue::MAX_SLOTS;
use crate::core::slot::JobKind;

/// Environment variable holding the admission ceiling.
pub const ENV_MAX_CONCURRENT: &str = "JOB_QUEUE_MAX_CONCURRENT";
/// Environment variable holding the slot table size.
pub const ENV_CAPACITY: &str = "JOB_QUEUE_CAPACITY";

const fn default_capacity() -> usize {
    MAX_SLOTS
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

const fn default_stack_size() -> usize {
    2 * 1024 * 1024
}

/// Job queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of slots holding an admission seat at once.
    pub max_concurrent: usize,
    /// Number of slots in the table.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_worker_count(),
            capacity: default_capacity(),
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".into());
        }
        if self.capacity > MAX_SLOTS {
            return Err(format!("capacity must be at most {MAX_SLOTS}"));
        }
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".into());
        }
        if self.max_concurrent > self.capacity {
            return Err("max_concurrent must not exceed capacity".into());
        }
        Ok(())
    }

    /// Parse queue configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from the environment, loading a `.env` file first if present.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable is not a number or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Ok(raw) = env::var(ENV_CAPACITY) {
            cfg.capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CAPACITY}={raw} is not a slot count"))?;
        }
        if let Ok(raw) = env::var(ENV_MAX_CONCURRENT) {
            cfg.max_concurrent = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_CONCURRENT}={raw} is not a worker count"))?;
        } else {
            cfg.max_concurrent = cfg.max_concurrent.min(cfg.capacity);
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

/// Apply pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPoolConfig {
    /// Queue the pool schedules through.
    pub queue: QueueConfig,
    /// Worker threads; capped at `queue.max_concurrent` when the pool starts.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Stack size for each worker thread in bytes.
    #[serde(default = "default_stack_size")]
    pub thread_stack_size: usize,
    /// Tag given to every slot the pool acquires.
    #[serde(default)]
    pub kind: JobKind,
}

impl Default for ApplyPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyPoolConfig {
    /// Configuration with one worker per CPU and a matching admission ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: QueueConfig::default(),
            worker_count: default_worker_count(),
            thread_stack_size: default_stack_size(),
            kind: JobKind::default(),
        }
    }

    /// Set the number of worker threads and raise the admission ceiling to match.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self.queue.max_concurrent = count;
        self
    }

    /// Set the admission ceiling.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.queue.max_concurrent = max_concurrent;
        self
    }

    /// Set the slot table size, which bounds jobs in flight.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.queue.capacity = capacity;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the slot tag.
    #[must_use]
    pub const fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of workers the pool actually runs.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.worker_count.min(self.queue.max_concurrent)
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.queue.validate().map_err(|e| format!("queue invalid: {e}"))?;
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }

    /// Parse pool configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity_is_table_bound() {
        assert_eq!(QueueConfig::default().capacity, MAX_SLOTS);
    }

    #[test]
    fn test_worker_count_raises_ceiling() {
        let cfg = ApplyPoolConfig::new().with_worker_count(3);
        assert_eq!(cfg.queue.max_concurrent, 3);
        assert_eq!(cfg.effective_workers(), 3);

        let cfg = cfg.with_max_concurrent(2);
        assert_eq!(cfg.effective_workers(), 2);
    }
}
