//! Per-request context.
//!
//! A [`RequestContext`] holds everything a single script execution reads
//! (server variables, script path, document root, POST body) and everything
//! it produces (output bytes, raw header block, status). The host owns it;
//! the bridge borrows it mutably for the duration of one execute call.

use super::error::{Error, Result};

/// Initial output buffer capacity.
pub const OUTPUT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Initial number of server variable slots.
pub const SERVER_VARS_CAPACITY: usize = 64;

/// Status reported when the script sets none.
pub const DEFAULT_STATUS: u16 = 200;

/// Per-request context data.
pub struct RequestContext {
    /// Worker thread this context is routed to.
    thread_index: i32,

    document_root: Option<String>,
    script_path: Option<String>,

    /// Raw request body for php://input
    post_body: Option<Vec<u8>>,
    /// Bytes of `post_body` already consumed
    post_read_pos: usize,

    /// $_SERVER variables, insertion ordered, duplicates kept
    server_vars: Vec<(String, String)>,

    output: Vec<u8>,
    headers: Vec<u8>,
    http_status: u16,
}

impl RequestContext {
    /// Create a context with pre-allocated output and server variable storage.
    ///
    /// Fails with [`Error::ResourceExhausted`] if either allocation cannot be
    /// satisfied; nothing is leaked in that case.
    pub fn new() -> Result<Self> {
        let mut output = Vec::new();
        output
            .try_reserve_exact(OUTPUT_BUFFER_CAPACITY)
            .map_err(|_| Error::alloc("output buffer", OUTPUT_BUFFER_CAPACITY))?;

        let mut server_vars = Vec::new();
        server_vars
            .try_reserve_exact(SERVER_VARS_CAPACITY)
            .map_err(|_| {
                Error::alloc(
                    "server variables",
                    SERVER_VARS_CAPACITY * std::mem::size_of::<(String, String)>(),
                )
            })?;

        Ok(Self {
            thread_index: 0,
            document_root: None,
            script_path: None,
            post_body: None,
            post_read_pos: 0,
            server_vars,
            output,
            headers: Vec::new(),
            http_status: DEFAULT_STATUS,
        })
    }

    /// Bind this context to a worker thread index. Not validated.
    pub fn set_thread_index(&mut self, index: i32) {
        self.thread_index = index;
    }

    pub fn thread_index(&self) -> i32 {
        self.thread_index
    }

    /// Append a $_SERVER variable. An absent value is stored as "".
    ///
    /// Storage doubles when full. If growing fails the new entry is dropped,
    /// existing entries stay untouched and the failure is returned.
    pub fn add_server_var(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        if self.server_vars.len() == self.server_vars.capacity() {
            let additional = self.server_vars.capacity().max(SERVER_VARS_CAPACITY);
            grow_server_vars(&mut self.server_vars, additional)?;
        }

        let key = try_copy_str(key, "server variable key")?;
        let value = try_copy_str(value.unwrap_or(""), "server variable value")?;
        self.server_vars.push((key, value));
        Ok(())
    }

    /// $_SERVER variables in insertion order.
    pub fn server_vars(&self) -> &[(String, String)] {
        &self.server_vars
    }

    /// Current number of server variable slots.
    pub fn server_vars_capacity(&self) -> usize {
        self.server_vars.capacity()
    }

    /// Replace the document root. `None` clears it.
    pub fn set_document_root(&mut self, root: Option<&str>) {
        self.document_root = root.map(str::to_owned);
    }

    pub fn document_root(&self) -> Option<&str> {
        self.document_root.as_deref()
    }

    /// Replace the script path. `None` clears it.
    pub fn set_script_path(&mut self, path: Option<&str>) {
        self.script_path = path.map(str::to_owned);
    }

    pub fn script_path(&self) -> Option<&str> {
        self.script_path.as_deref()
    }

    /// Replace the POST body and rewind the read cursor.
    /// Empty or absent input clears the body.
    pub fn set_post_body(&mut self, body: Option<&[u8]>) {
        self.post_body = body.filter(|b| !b.is_empty()).map(<[u8]>::to_vec);
        self.post_read_pos = 0;
    }

    pub fn post_body(&self) -> Option<&[u8]> {
        self.post_body.as_deref()
    }

    /// Bytes of the POST body not yet consumed by [`read_post`](Self::read_post).
    pub fn post_remaining(&self) -> usize {
        self.post_body
            .as_ref()
            .map(|b| b.len().saturating_sub(self.post_read_pos))
            .unwrap_or(0)
    }

    /// Copy up to `buf.len()` unread POST bytes into `buf`.
    ///
    /// Returns the number of bytes copied; 0 signals exhaustion.
    pub fn read_post(&mut self, buf: &mut [u8]) -> usize {
        let Some(ref body) = self.post_body else {
            return 0;
        };

        let remaining = &body[self.post_read_pos.min(body.len())..];
        let to_read = remaining.len().min(buf.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.post_read_pos += to_read;
        to_read
    }

    /// Output accumulated during the last execution.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Raw header block accumulated during the last execution.
    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    /// Last status recorded during execution (200 if none).
    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Output buffer capacity.
    pub fn output_capacity(&self) -> usize {
        self.output.capacity()
    }

    /// Release every owned field.
    ///
    /// Safe to call repeatedly and on a context whose optional fields were
    /// never set. The context stays usable afterwards; storage is re-grown on demand.
    pub fn destroy(&mut self) {
        self.document_root = None;
        self.script_path = None;
        self.post_body = None;
        self.post_read_pos = 0;
        self.server_vars = Vec::new();
        self.output = Vec::new();
        self.headers = Vec::new();
        self.http_status = DEFAULT_STATUS;
    }

    /// Reset per-execution output state. Capacity is kept.
    pub(crate) fn reset_output(&mut self) {
        self.output.clear();
        self.headers.clear();
        self.http_status = DEFAULT_STATUS;
    }

    /// Append script output. Returns the number of bytes accepted
    /// (0 if the buffer could not grow).
    pub(crate) fn append_output(&mut self, bytes: &[u8]) -> usize {
        if self.output.try_reserve(bytes.len()).is_err() {
            return 0;
        }
        self.output.extend_from_slice(bytes);
        bytes.len()
    }

    /// Append one header line to the raw CRLF-separated header block.
    pub(crate) fn append_header_line(&mut self, line: &[u8]) -> Result<()> {
        let needed = line.len() + if self.headers.is_empty() { 0 } else { 2 };
        self.headers
            .try_reserve(needed)
            .map_err(|_| Error::alloc("headers buffer", needed))?;
        if !self.headers.is_empty() {
            self.headers.extend_from_slice(b"\r\n");
        }
        self.headers.extend_from_slice(line);
        Ok(())
    }

    /// Drop every header line whose name matches `name` (case-insensitive).
    pub(crate) fn remove_header_lines(&mut self, name: &str) {
        if self.headers.is_empty() {
            return;
        }
        let kept: Vec<&[u8]> = self
            .headers
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !header_name_matches(line, name))
            .collect();
        self.headers = kept.join(&b"\r\n"[..]);
    }

    pub(crate) fn clear_headers(&mut self) {
        self.headers.clear();
    }

    pub(crate) fn set_http_status(&mut self, status: u16) {
        self.http_status = status;
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("thread_index", &self.thread_index)
            .field("document_root", &self.document_root)
            .field("script_path", &self.script_path)
            .field("post_len", &self.post_body.as_ref().map_or(0, Vec::len))
            .field("server_vars", &self.server_vars.len())
            .field("output_len", &self.output.len())
            .field("http_status", &self.http_status)
            .finish()
    }
}

fn header_name_matches(line: &[u8], name: &str) -> bool {
    let Some(colon) = line.iter().position(|b| *b == b':') else {
        return false;
    };
    std::str::from_utf8(&line[..colon])
        .map(|n| n.trim().eq_ignore_ascii_case(name.trim()))
        .unwrap_or(false)
}

/// Reserve `additional` variable slots. On failure `vars` is left as it was.
fn grow_server_vars(vars: &mut Vec<(String, String)>, additional: usize) -> Result<()> {
    vars.try_reserve_exact(additional).map_err(|_| {
        Error::alloc(
            "server variables",
            additional.saturating_mul(std::mem::size_of::<(String, String)>()),
        )
    })
}

/// Copy a string, surfacing allocation failure instead of aborting.
pub(crate) fn try_copy_str(s: &str, what: &'static str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())
        .map_err(|_| Error::alloc(what, s.len()))?;
    out.push_str(s);
    Ok(out)
}

/// Copy a byte slice, surfacing allocation failure instead of aborting.
pub(crate) fn try_copy_bytes(bytes: &[u8], what: &'static str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(bytes.len())
        .map_err(|_| Error::alloc(what, bytes.len()))?;
    out.extend_from_slice(bytes);
    Ok(out)
}
