//! Executor configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_duration, env_parse};
use super::ConfigError;
use crate::executor::pool::DEFAULT_QUEUE_MULTIPLIER;

/// Executor configuration loaded from environment.
///
/// Worker count and queue capacity are resolved at construction time.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Resolved worker count (never zero). Worker ids are the thread indices.
    worker_count: NonZeroUsize,
    /// Resolved queue capacity (never zero).
    queue_capacity: NonZeroUsize,
    /// Host-side limit on one execution; `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let workers: usize = env_parse("PHP_WORKERS", 0)?;
        let capacity: usize = env_parse("QUEUE_CAPACITY", 0)?;
        let request_timeout = env_duration("REQUEST_TIMEOUT", "2m")?;
        Ok(Self::new(workers, capacity, request_timeout))
    }

    /// Resolve 0 workers to the CPU count and 0 capacity to workers * 100.
    pub fn new(workers: usize, queue_capacity: usize, request_timeout: Option<Duration>) -> Self {
        let workers = NonZeroUsize::new(workers)
            .or_else(|| NonZeroUsize::new(num_cpus::get()))
            .unwrap_or(NonZeroUsize::MIN);
        let queue_capacity = NonZeroUsize::new(queue_capacity)
            .or_else(|| NonZeroUsize::new(workers.get().saturating_mul(DEFAULT_QUEUE_MULTIPLIER)))
            .unwrap_or(workers);

        Self {
            worker_count: workers,
            queue_capacity,
            request_timeout,
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count.get()
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.get()
    }
}
