//! Request and result types passed between the server and the executor.

use std::time::Duration;

use bytes::Bytes;

use crate::sapi::Response;

/// Key-value pair type for parameters (faster than HashMap for small collections).
pub type ParamList = Vec<(String, String)>;

/// Everything a worker needs to build a request context.
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    /// Script identifier handed to the bridge (entry point, relative to the document root)
    pub script: String,
    pub document_root: Option<String>,
    /// Absolute script file, if already resolved
    pub script_path: Option<String>,
    /// $_SERVER variables, in order
    pub server_vars: ParamList,
    /// Raw request body for php://input
    pub body: Option<Bytes>,
    /// Raw Cookie header
    pub cookies: Option<String>,
}

impl ScriptRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn with_document_root(mut self, root: impl Into<String>) -> Self {
        self.document_root = Some(root.into());
        self
    }

    pub fn with_script_path(mut self, path: impl Into<String>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    pub fn with_server_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_vars.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }
}

/// Result of one execution on a worker.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub response: Response,
    /// Worker thread index the request ran on
    pub thread_index: i32,
    /// Variables announced to the host
    pub variables: usize,
    /// Interpreter messages logged during execution
    pub log_count: usize,
    /// Time spent inside the worker
    pub elapsed: Duration,
}
