//! Immutable execution result.

use std::fmt::Write;

use bytes::Bytes;

use super::context::{try_copy_bytes, RequestContext, DEFAULT_STATUS};
use super::error::{Error, Result};

/// Marker identifying this engine in default response headers.
pub const POWERED_BY: &str = "php-embed-bridge";

/// Headers attached when the interpreter produced none.
pub const DEFAULT_HEADERS: &str =
    "Content-Type: text/html; charset=utf-8\r\nX-Powered-By: php-embed-bridge";

/// Status, raw header block and body of one execution.
///
/// Owns copies of everything it exposes; the context it was built from may be
/// destroyed right after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Bytes,
    body: Bytes,
}

impl Response {
    /// Response from already-owned parts, taken as is.
    pub fn new(status: u16, headers: Bytes, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Snapshot the context's accumulated output.
    ///
    /// Status 0 becomes 200; an empty header block is replaced by
    /// [`DEFAULT_HEADERS`].
    pub(crate) fn from_context(ctx: &RequestContext) -> Result<Self> {
        let body = try_copy_bytes(ctx.output(), "response body")?;
        let headers = if ctx.headers().is_empty() {
            Bytes::from_static(DEFAULT_HEADERS.as_bytes())
        } else {
            Bytes::from(try_copy_bytes(ctx.headers(), "response headers")?)
        };
        let status = match ctx.http_status() {
            0 => DEFAULT_STATUS,
            s => s,
        };

        Ok(Self {
            status,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Diagnostic page produced when no interpreter is available.
    ///
    /// The body is sized up front so an allocation failure is reported as
    /// [`Error::ResourceExhausted`], like [`from_context`](Self::from_context).
    pub(crate) fn fallback(script: &str, thread_index: i32) -> Result<Self> {
        // "-2147483648"
        const THREAD_DIGITS: usize = 11;

        let head = [
            "<!DOCTYPE html>\n<html><head><title>",
            POWERED_BY,
            "</title></head>\n<body><h1>",
            POWERED_BY,
            " (fallback mode)</h1>\n<p>Script: <code>",
        ];
        let middle = "</code></p>\n<p>Thread: ";
        let tail = "</p>\n<p><em>PHP embedding unavailable in current build</em></p>\n</body></html>";

        let needed = head.iter().map(|p| p.len()).sum::<usize>()
            + escaped_len(script)
            + middle.len()
            + THREAD_DIGITS
            + tail.len();

        let mut body = String::new();
        body.try_reserve_exact(needed)
            .map_err(|_| Error::alloc("fallback body", needed))?;
        for part in head {
            body.push_str(part);
        }
        push_escaped(&mut body, script);
        body.push_str(middle);
        let _ = write!(body, "{}", thread_index);
        body.push_str(tail);

        Ok(Self {
            status: DEFAULT_STATUS,
            headers: Bytes::from_static(DEFAULT_HEADERS.as_bytes()),
            body: Bytes::from(body),
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw CRLF-separated header block.
    pub fn headers(&self) -> &Bytes {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header block split into `(name, value)` pairs.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        parse_headers(&self.headers)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<String> {
        self.header_pairs()
            .into_iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn into_parts(self) -> (u16, Bytes, Bytes) {
        (self.status, self.headers, self.body)
    }
}

/// Parse a raw header block.
///
/// Lines are separated by CRLF or LF. Empty lines and lines without a colon
/// are skipped; names and values are trimmed.
pub fn parse_headers(raw: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(raw);
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(escaped_len(input));
    push_escaped(&mut out, input);
    out
}

fn html_entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Length of `input` once escaped.
fn escaped_len(input: &str) -> usize {
    input
        .chars()
        .map(|c| html_entity(c).map_or(c.len_utf8(), str::len))
        .sum()
}

fn push_escaped(out: &mut String, input: &str) {
    for c in input.chars() {
        match html_entity(c) {
            Some(entity) => out.push_str(entity),
            None => out.push(c),
        }
    }
}
