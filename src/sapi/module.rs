//! Engine lifecycle.
//!
//! An [`Engine`] wraps a [`Bridge`] with the process-wide startup and
//! shutdown sequence: interpreter initialization, extension loading and the
//! started flag that gates execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::bridge::{Bridge, ExecutionMode};
use super::callbacks::HostCallbacks;
use super::context::RequestContext;
use super::error::{Error, Result};
use super::response::Response;
use crate::php::{self, ExtensionManager};

/// Embedded interpreter lifecycle plus the bridge that executes requests.
#[derive(Debug)]
pub struct Engine {
    version: String,
    bridge: Bridge,
    extensions: Option<ExtensionManager>,
    started: AtomicBool,
    /// Serializes startup and shutdown.
    lifecycle: Mutex<()>,
}

impl Engine {
    /// Create an engine for `version` (7.4, 8.0, 8.1, 8.2, 8.3 or 8.4).
    pub fn new(version: &str, bridge: Bridge) -> Result<Self> {
        if !php::is_supported(version) {
            return Err(Error::UnsupportedVersion(version.to_string()));
        }

        Ok(Self {
            version: version.to_string(),
            bridge,
            extensions: None,
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        })
    }

    /// Load `extensions` right after the interpreter starts.
    pub fn with_extensions(mut self, extensions: ExtensionManager) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn mode(&self) -> ExecutionMode {
        self.bridge.mode()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn extensions(&self) -> Option<&ExtensionManager> {
        self.extensions.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Start the interpreter. A second call is a no-op.
    ///
    /// Failure leaves the engine stopped; retrying is up to the caller.
    pub fn startup(&self) -> Result<()> {
        let _lock = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_started() {
            return Ok(());
        }

        if let Some(interp) = self.bridge.interpreter() {
            interp.startup(&self.version).map_err(Error::Startup)?;

            if let Some(ext) = &self.extensions {
                if let Err(e) = ext.load_extensions() {
                    interp.shutdown();
                    return Err(e.into());
                }
            }
        }

        self.started.store(true, Ordering::SeqCst);
        tracing::info!(
            version = %self.version,
            mode = %self.mode(),
            backend = self.bridge.backend_name(),
            "Engine started"
        );
        Ok(())
    }

    /// Stop the interpreter. No-op when not started.
    ///
    /// Must only be called once every context is done; remaining active
    /// thread indices are logged.
    pub fn shutdown(&self) {
        let _lock = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }

        let active = self.bridge.active();
        if !active.is_empty() {
            let indices: Vec<i32> = active.iter().map(|b| b.thread_index).collect();
            tracing::warn!(active = ?indices, "Engine shutdown with active contexts");
        }

        if let Some(ext) = &self.extensions {
            ext.unload_all();
        }
        if let Some(interp) = self.bridge.interpreter() {
            interp.shutdown();
        }

        tracing::info!(version = %self.version, "Engine shutdown complete");
    }

    /// Execute `script` against `ctx`. Fails with [`Error::NotStarted`] before startup.
    pub fn execute(
        &self,
        ctx: &mut RequestContext,
        script: &str,
        host: &dyn HostCallbacks,
    ) -> Result<Response> {
        if !self.is_started() {
            return Err(Error::NotStarted);
        }
        self.bridge.execute(ctx, script, host)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
