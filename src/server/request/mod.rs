//! Mapping of HTTP requests onto script requests.
//!
//! Script requests always run the site's entry point; the URI only reaches
//! the script through `$_SERVER` (`REQUEST_URI`, `QUERY_STRING`...).

mod parser;

use std::net::SocketAddr;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::request::Parts;
use http::{header, Version};

pub use parser::{join_cookies, joined_value, server_var_name};

use crate::types::ScriptRequest;

/// Value of `SERVER_SOFTWARE`.
pub const SERVER_SOFTWARE: &str = concat!("php_embed_bridge/", env!("CARGO_PKG_VERSION"));

const GATEWAY_INTERFACE: &str = "CGI/1.1";

/// Site-wide script settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    document_root: String,
    entry_point: String,
    script_name: String,
    script_filename: String,
}

impl Site {
    /// `entry_point` is relative to `document_root`.
    pub fn new(document_root: &Path, entry_point: &str) -> Self {
        let relative = entry_point.trim_start_matches('/');
        Self {
            document_root: document_root.to_string_lossy().into_owned(),
            entry_point: relative.to_string(),
            script_name: format!("/{}", relative),
            script_filename: document_root.join(relative).to_string_lossy().into_owned(),
        }
    }

    pub fn document_root(&self) -> &str {
        &self.document_root
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// URL path of the script, e.g. `/public/index.php`.
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Absolute path of the script file.
    pub fn script_filename(&self) -> &str {
        &self.script_filename
    }
}

/// Both ends of the connection a request arrived on.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

/// HTTP version as PHP reports it in `SERVER_PROTOCOL`.
pub fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Build the script request for one HTTP request.
pub fn build_script_request(parts: &Parts, body: Bytes, peer: &Peer, site: &Site) -> ScriptRequest {
    let uri = &parts.uri;
    let headers = &parts.headers;

    let request_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let request_uri = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    // HTTP/2 carries the host in :authority
    let server_name = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.parse::<http::uri::Authority>().ok())
        .or_else(|| uri.authority().cloned())
        .map(|a| a.host().to_string())
        .unwrap_or_else(|| peer.local_addr.ip().to_string());

    let mut vars: Vec<(String, String)> = Vec::with_capacity(24 + headers.keys_len());
    let mut push = |key: &str, value: String| vars.push((key.to_string(), value));

    push("REQUEST_METHOD", parts.method.as_str().to_string());
    push("REQUEST_URI", request_uri);
    push("QUERY_STRING", uri.query().unwrap_or("").to_string());
    push("SERVER_PROTOCOL", protocol_name(parts.version).to_string());
    push("SERVER_NAME", server_name);
    push("SERVER_ADDR", peer.local_addr.ip().to_string());
    push("SERVER_PORT", peer.local_addr.port().to_string());
    push("SERVER_SOFTWARE", SERVER_SOFTWARE.to_string());
    push("GATEWAY_INTERFACE", GATEWAY_INTERFACE.to_string());
    push("DOCUMENT_ROOT", site.document_root.clone());
    push("SCRIPT_NAME", site.script_name.clone());
    push("SCRIPT_FILENAME", site.script_filename.clone());
    push("PHP_SELF", site.script_name.clone());
    push("REMOTE_ADDR", peer.remote_addr.ip().to_string());
    push("REMOTE_PORT", peer.remote_addr.port().to_string());
    push("REQUEST_TIME", request_time.as_secs().to_string());
    push(
        "REQUEST_TIME_FLOAT",
        format!("{:.6}", request_time.as_secs_f64()),
    );

    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        push(
            "CONTENT_TYPE",
            String::from_utf8_lossy(content_type.as_bytes()).into_owned(),
        );
    }
    match headers.get(header::CONTENT_LENGTH) {
        Some(len) => push(
            "CONTENT_LENGTH",
            String::from_utf8_lossy(len.as_bytes()).into_owned(),
        ),
        None if !body.is_empty() => push("CONTENT_LENGTH", body.len().to_string()),
        None => {}
    }

    let cookies = join_cookies(headers);

    for name in headers.keys() {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        let value = if name == header::COOKIE {
            cookies.clone().unwrap_or_default()
        } else {
            joined_value(headers, name, ", ")
        };
        push(&server_var_name(name.as_str()), value);
    }

    let mut request = ScriptRequest::new(site.entry_point.clone())
        .with_document_root(site.document_root.clone())
        .with_script_path(site.script_filename.clone());
    request.server_vars = vars;
    if !body.is_empty() {
        request.body = Some(body);
    }
    request.cookies = cookies;
    request
}
