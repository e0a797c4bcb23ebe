//! Worker pool infrastructure.
//!
//! Blocking script executions run on dedicated OS threads; the async side
//! only waits on a oneshot reply.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      ThreadPool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐    ┌─────────┐    ┌─────────┐                 │
//! │  │ Worker0 │    │ Worker1 │    │ Worker2 │  ...            │
//! │  └────┬────┘    └────┬────┘    └────┬────┘                 │
//! │       └──────────────┴──────────────┘                      │
//! │                      │                                     │
//! │              ┌───────▼───────┐                             │
//! │              │  mpsc channel │  (bounded queue)            │
//! │              └───────┬───────┘                             │
//! │              ┌───────▼───────┐                             │
//! │              │    execute()  │  (async, oneshot reply)     │
//! │              └───────────────┘                             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The worker id doubles as the request context's thread index.

mod error;
mod thread;

use serde::Serialize;

pub use error::{PoolError, PoolResult};
pub use thread::{ThreadPool, DEFAULT_QUEUE_MULTIPLIER};

/// Pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Worker threads started.
    pub workers: usize,
    /// Jobs finished (including panicked ones).
    pub total_executed: u64,
    /// Jobs running right now.
    pub busy: usize,
    /// Jobs waiting in the queue.
    pub pending: usize,
    /// Results abandoned after a timeout.
    pub timeouts: u64,
    /// Jobs rejected because the queue was full.
    pub rejected: u64,
    pub panics: u64,
}
