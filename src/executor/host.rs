//! Host side of the callback contract.
//!
//! [`WorkerHost`] keeps one slot per worker thread index. A slot is armed
//! with the request's cookies before execution and drained afterwards; in
//! between, only the worker owning that index touches it.

use std::sync::{Mutex, MutexGuard};

use crate::sapi::{HostCallbacks, LogType};

/// What the callbacks recorded for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSlot {
    /// Raw `Cookie` header value.
    pub cookies: Option<String>,
    /// Variables announced by the bridge, in order.
    pub variables: Vec<(String, String)>,
    /// Status and header block from the last send-headers call.
    pub sent_status: Option<u16>,
    pub sent_headers: Vec<u8>,
    /// Bytes reported through write-output.
    pub bytes_written: usize,
    /// Interpreter messages logged.
    pub log_count: usize,
}

/// Per-worker callback state for a pool of `workers` threads.
#[derive(Debug)]
pub struct WorkerHost {
    slots: Vec<Mutex<HostSlot>>,
}

impl WorkerHost {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| Mutex::new(HostSlot::default())).collect(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, thread_index: i32) -> Option<MutexGuard<'_, HostSlot>> {
        let idx = usize::try_from(thread_index).ok()?;
        let slot = self.slots.get(idx)?;
        Some(slot.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Reset the slot for a new request.
    pub fn begin(&self, thread_index: i32, cookies: Option<String>) {
        if let Some(mut slot) = self.slot(thread_index) {
            *slot = HostSlot {
                cookies,
                ..HostSlot::default()
            };
        }
    }

    /// Take everything recorded since [`begin`](Self::begin).
    pub fn finish(&self, thread_index: i32) -> HostSlot {
        self.slot(thread_index)
            .map(|mut slot| std::mem::take(&mut *slot))
            .unwrap_or_default()
    }
}

impl HostCallbacks for WorkerHost {
    fn write_output(&self, thread_index: i32, data: &[u8]) -> usize {
        match self.slot(thread_index) {
            Some(mut slot) => {
                slot.bytes_written += data.len();
                data.len()
            }
            None => 0,
        }
    }

    fn send_headers(&self, thread_index: i32, status: u16, headers: &[u8]) -> bool {
        let Some(mut slot) = self.slot(thread_index) else {
            return false;
        };
        slot.sent_status = Some(status);
        slot.sent_headers.clear();
        slot.sent_headers.extend_from_slice(headers);
        true
    }

    fn read_post(&self, _thread_index: i32, _buf: &mut [u8]) -> usize {
        // Request bodies travel in the context
        0
    }

    fn read_cookies(&self, thread_index: i32) -> Option<String> {
        self.slot(thread_index)?.cookies.clone()
    }

    fn register_variable(&self, thread_index: i32, key: &str, value: &str) {
        if let Some(mut slot) = self.slot(thread_index) {
            slot.variables.push((key.to_string(), value.to_string()));
        }
    }

    fn log_message(&self, thread_index: i32, message: &str, log_type: LogType) {
        if let Some(mut slot) = self.slot(thread_index) {
            slot.log_count += 1;
        }
        match log_type.level() {
            tracing::Level::ERROR => tracing::error!(target: "php", worker = thread_index, "{}", message),
            tracing::Level::WARN => tracing::warn!(target: "php", worker = thread_index, "{}", message),
            tracing::Level::INFO => tracing::info!(target: "php", worker = thread_index, "{}", message),
            _ => tracing::debug!(target: "php", worker = thread_index, "{}", message),
        }
    }
}
