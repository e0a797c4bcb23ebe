//! Active-context bookkeeping and the execution session.
//!
//! [`ActivationTable`] records which thread indices currently have a context
//! bound to them. Binding returns an [`ActivationGuard`] that clears the entry
//! when dropped, so every exit path of an execute call (early return, error,
//! panic unwinding) leaves the index inactive.
//!
//! A [`Session`] is the explicit execution parameter handed to the
//! interpreter: it borrows the context for the duration of one execute call
//! and routes every interpreter-side effect to the context and to the host.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::callbacks::{HostCallbacks, LogType};
use super::context::RequestContext;
use super::error::{Error, Result};

#[derive(Debug, Clone)]
struct Binding {
    script: String,
    since: Instant,
}

/// Snapshot of one active binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBinding {
    pub thread_index: i32,
    pub script: String,
    pub elapsed: Duration,
}

/// Mapping from worker thread index to the script it is currently executing.
#[derive(Debug, Default)]
pub struct ActivationTable {
    slots: Mutex<HashMap<i32, Binding>>,
}

impl ActivationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, Binding>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `thread_index` active for `script`.
    ///
    /// Fails with [`Error::ThreadBusy`] if the index is already bound.
    pub fn bind(&self, thread_index: i32, script: &str) -> Result<ActivationGuard<'_>> {
        let mut slots = self.lock();
        if slots.contains_key(&thread_index) {
            return Err(Error::ThreadBusy { thread_index });
        }
        slots.insert(
            thread_index,
            Binding {
                script: script.to_owned(),
                since: Instant::now(),
            },
        );
        Ok(ActivationGuard {
            table: self,
            thread_index,
        })
    }

    pub fn is_active(&self, thread_index: i32) -> bool {
        self.lock().contains_key(&thread_index)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Current bindings ordered by thread index.
    pub fn snapshot(&self) -> Vec<ActiveBinding> {
        let mut out: Vec<ActiveBinding> = self
            .lock()
            .iter()
            .map(|(idx, b)| ActiveBinding {
                thread_index: *idx,
                script: b.script.clone(),
                elapsed: b.since.elapsed(),
            })
            .collect();
        out.sort_by_key(|b| b.thread_index);
        out
    }

    fn release(&self, thread_index: i32) {
        self.lock().remove(&thread_index);
    }
}

/// Clears the binding for one thread index on drop.
#[must_use = "the binding is cleared as soon as the guard is dropped"]
pub struct ActivationGuard<'a> {
    table: &'a ActivationTable,
    thread_index: i32,
}

impl ActivationGuard<'_> {
    pub fn thread_index(&self) -> i32 {
        self.thread_index
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        self.table.release(self.thread_index);
    }
}

/// The context currently executing plus the host it reports to.
pub struct Session<'a> {
    ctx: &'a mut RequestContext,
    host: &'a dyn HostCallbacks,
    script: &'a str,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        ctx: &'a mut RequestContext,
        host: &'a dyn HostCallbacks,
        script: &'a str,
    ) -> Self {
        Self { ctx, host, script }
    }

    pub fn thread_index(&self) -> i32 {
        self.ctx.thread_index()
    }

    /// Script identifier passed to execute.
    pub fn script(&self) -> &str {
        self.script
    }

    pub fn script_path(&self) -> Option<&str> {
        self.ctx.script_path()
    }

    pub fn document_root(&self) -> Option<&str> {
        self.ctx.document_root()
    }

    pub fn server_vars(&self) -> &[(String, String)] {
        self.ctx.server_vars()
    }

    /// Append script output to the context and mirror it to the host sink.
    ///
    /// Returns the number of bytes buffered in the context.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let written = self.ctx.append_output(data);
        if written > 0 {
            self.host.write_output(self.ctx.thread_index(), &data[..written]);
        }
        written
    }

    /// Record the response status. Values outside 100..=599 are ignored.
    pub fn set_status(&mut self, status: u16) {
        if (100..600).contains(&status) {
            self.ctx.set_http_status(status);
        }
    }

    pub fn status(&self) -> u16 {
        self.ctx.http_status()
    }

    /// Add one raw header line (`Name: value`).
    ///
    /// A `HTTP/x.y NNN reason` status line sets the status instead.
    pub fn add_header(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(());
        }
        if line.starts_with("HTTP/") {
            if let Some(code) = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u16>().ok())
            {
                self.set_status(code);
            }
            return Ok(());
        }
        self.ctx.append_header_line(line.as_bytes())
    }

    /// Replace every header named like `line`'s name with `line`.
    pub fn replace_header(&mut self, line: &str) -> Result<()> {
        if let Some((name, _)) = line.split_once(':') {
            if !line.starts_with("HTTP/") {
                self.ctx.remove_header_lines(name);
            }
        }
        self.add_header(line)
    }

    /// Remove headers by name.
    pub fn remove_header(&mut self, name: &str) {
        self.ctx.remove_header_lines(name);
    }

    pub fn clear_headers(&mut self) {
        self.ctx.clear_headers();
    }

    /// Raw header block accumulated so far.
    pub fn headers(&self) -> &[u8] {
        self.ctx.headers()
    }

    /// Deliver the current status and header block to the host.
    pub fn send_headers(&mut self) -> bool {
        self.host.send_headers(
            self.ctx.thread_index(),
            self.ctx.http_status(),
            self.ctx.headers(),
        )
    }

    /// Read request body bytes.
    ///
    /// The context's own POST body is consumed first; a context without a
    /// body defers to the host.
    pub fn read_post(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        if self.ctx.post_body().is_some() {
            return self.ctx.read_post(buf);
        }
        self.host.read_post(self.ctx.thread_index(), buf)
    }

    pub fn read_cookies(&self) -> Option<String> {
        self.host.read_cookies(self.ctx.thread_index())
    }

    /// Forward a diagnostic message to the host.
    pub fn log(&self, message: &str, log_type: LogType) {
        self.host
            .log_message(self.ctx.thread_index(), message, log_type);
    }
}
