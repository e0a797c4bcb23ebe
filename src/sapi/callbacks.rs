//! Host callback contract.
//!
//! The bridge never performs I/O itself. Everything the interpreter wants to
//! say to the outside world goes through [`HostCallbacks`], addressed by the
//! worker thread index of the context being executed, so concurrent workers
//! never share mutable state through these calls.

/// Severity tag attached to interpreter log messages (syslog priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogType(pub i32);

impl LogType {
    pub const ERROR: LogType = LogType(3);
    pub const WARNING: LogType = LogType(4);
    pub const NOTICE: LogType = LogType(5);
    pub const INFO: LogType = LogType(6);
    pub const DEBUG: LogType = LogType(7);

    /// Map the syslog priority to a tracing level.
    ///
    /// 0-3 (emerg..err) error, 4 warn, 5-6 info, anything else debug.
    pub fn level(self) -> tracing::Level {
        match self.0 {
            0..=3 => tracing::Level::ERROR,
            4 => tracing::Level::WARN,
            5 | 6 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

/// The six operations a host implements for the bridge.
///
/// Implementations must be safe to call from any worker thread; each call
/// only touches state belonging to `thread_index`.
pub trait HostCallbacks: Send + Sync {
    /// Append bytes to the thread's output sink. Returns bytes accepted.
    fn write_output(&self, thread_index: i32, data: &[u8]) -> usize;

    /// Deliver a status code and the raw header block. Must not block indefinitely.
    fn send_headers(&self, thread_index: i32, status: u16, headers: &[u8]) -> bool;

    /// Copy up to `buf.len()` body bytes into `buf`. 0 signals exhaustion.
    fn read_post(&self, thread_index: i32, buf: &mut [u8]) -> usize;

    /// Raw `Cookie` header value of the thread's current request.
    fn read_cookies(&self, thread_index: i32) -> Option<String>;

    /// Announce one request-scoped variable. Called in insertion order.
    fn register_variable(&self, thread_index: i32, key: &str, value: &str);

    /// Forward a diagnostic message. Never fails; problems are swallowed.
    fn log_message(&self, thread_index: i32, message: &str, log_type: LogType);
}

/// Callbacks that accept everything and report nothing.
///
/// Useful when the host only cares about the returned `Response`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl HostCallbacks for NoopCallbacks {
    fn write_output(&self, _thread_index: i32, data: &[u8]) -> usize {
        data.len()
    }

    fn send_headers(&self, _thread_index: i32, _status: u16, _headers: &[u8]) -> bool {
        true
    }

    fn read_post(&self, _thread_index: i32, _buf: &mut [u8]) -> usize {
        0
    }

    fn read_cookies(&self, _thread_index: i32) -> Option<String> {
        None
    }

    fn register_variable(&self, _thread_index: i32, _key: &str, _value: &str) {}

    fn log_message(&self, _thread_index: i32, _message: &str, _log_type: LogType) {}
}
