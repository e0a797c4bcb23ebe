//! Worker pool error types.

use std::fmt;
use std::time::Duration;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The request queue is full.
    QueueFull {
        /// Maximum queue capacity.
        capacity: usize,
        /// Current number of pending requests.
        pending: usize,
    },

    /// No result arrived in time. The job itself keeps running.
    Timeout(Duration),

    /// The job panicked on its worker thread.
    WorkerPanic(String),

    /// The pool has been shut down.
    Shutdown,

    /// The response channel was closed unexpectedly.
    ChannelClosed,

    /// A worker thread could not be spawned.
    Spawn(String),
}

impl PoolError {
    pub fn is_queue_full(&self) -> bool {
        matches!(self, PoolError::QueueFull { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, PoolError::Shutdown)
    }

    /// Short message for logs.
    pub fn message(&self) -> &str {
        match self {
            PoolError::QueueFull { .. } => "Queue full",
            PoolError::Timeout(_) => "Request timeout",
            PoolError::WorkerPanic(_) => "Worker panic",
            PoolError::Shutdown => "Pool shutdown",
            PoolError::ChannelClosed => "Channel closed",
            PoolError::Spawn(_) => "Worker spawn failed",
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::QueueFull { capacity, pending } => {
                write!(f, "queue full: {}/{} pending requests", pending, capacity)
            }
            PoolError::Timeout(duration) => {
                write!(f, "request timeout after {:?}", duration)
            }
            PoolError::WorkerPanic(msg) => write!(f, "worker panic: {}", msg),
            PoolError::Shutdown => write!(f, "pool has been shut down"),
            PoolError::ChannelClosed => write!(f, "response channel closed unexpectedly"),
            PoolError::Spawn(msg) => write!(f, "failed to spawn worker thread: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
