//! Execution bridge.
//!
//! [`Bridge::execute`] binds a context to its thread index, resets the
//! per-execution output state, publishes server variables to the host, runs
//! the configured backend and snapshots the result into a [`Response`].
//!
//! The backend is chosen once at construction and exposed as an
//! [`ExecutionMode`], so callers never have to guess it from response shape.

use std::fmt;

use super::callbacks::{HostCallbacks, LogType};
use super::context::RequestContext;
use super::error::{Error, Result};
use super::response::Response;
use super::session::{ActivationTable, ActiveBinding, Session};

/// How scripts are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Scripts run on the embedded interpreter.
    FullInterpreter,
    /// A fixed diagnostic page is returned instead.
    Fallback,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::FullInterpreter => "full",
            ExecutionMode::Fallback => "fallback",
        }
    }

    /// Whether a full interpreter is compiled into this build.
    pub fn full_available() -> bool {
        cfg!(feature = "php-embed")
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded interpreter driven by the bridge.
///
/// Output, headers and status are reported through the [`Session`]; the
/// bridge reads them back from the context once `execute` returns.
pub trait Interpreter: Send + Sync {
    /// Initialize interpreter-global state.
    fn startup(&self, version_hint: &str) -> std::result::Result<(), String>;

    /// Release interpreter-global state.
    fn shutdown(&self);

    /// Run one script. Errors are reported to the host log, never to the caller.
    fn execute(&self, session: &mut Session<'_>) -> std::result::Result<(), String>;

    fn name(&self) -> &'static str;
}

enum Backend {
    Full(Box<dyn Interpreter>),
    Fallback,
}

/// Connects contexts, the interpreter and host callbacks.
pub struct Bridge {
    backend: Backend,
    active: ActivationTable,
}

impl Bridge {
    /// Bridge that never runs scripts and answers with the diagnostic page.
    pub fn fallback() -> Self {
        Self {
            backend: Backend::Fallback,
            active: ActivationTable::new(),
        }
    }

    /// Bridge running scripts on `interpreter`.
    pub fn with_interpreter(interpreter: Box<dyn Interpreter>) -> Self {
        Self {
            backend: Backend::Full(interpreter),
            active: ActivationTable::new(),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.backend {
            Backend::Full(_) => ExecutionMode::FullInterpreter,
            Backend::Fallback => ExecutionMode::Fallback,
        }
    }

    pub(crate) fn interpreter(&self) -> Option<&dyn Interpreter> {
        match &self.backend {
            Backend::Full(interp) => Some(interp.as_ref()),
            Backend::Fallback => None,
        }
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.interpreter().map_or("fallback", |i| i.name())
    }

    pub fn is_active(&self, thread_index: i32) -> bool {
        self.active.is_active(thread_index)
    }

    pub fn active_count(&self) -> usize {
        self.active.active_count()
    }

    /// Currently executing thread indices and their scripts.
    pub fn active(&self) -> Vec<ActiveBinding> {
        self.active.snapshot()
    }

    /// Execute `script` against `ctx`.
    ///
    /// Fails without touching `ctx` if `script` is empty or the thread index
    /// is already executing. The thread index is released before returning
    /// on every path.
    pub fn execute(
        &self,
        ctx: &mut RequestContext,
        script: &str,
        host: &dyn HostCallbacks,
    ) -> Result<Response> {
        if script.is_empty() {
            return Err(Error::InvalidArgument("script path is empty"));
        }

        let thread_index = ctx.thread_index();
        let _guard = self.active.bind(thread_index, script)?;

        ctx.reset_output();

        for (key, value) in ctx.server_vars() {
            host.register_variable(thread_index, key, value);
        }

        match &self.backend {
            Backend::Full(interp) => {
                let mut session = Session::new(ctx, host, script);
                if let Err(msg) = interp.execute(&mut session) {
                    session.log(&msg, LogType::ERROR);
                }
                Response::from_context(ctx)
            }
            Backend::Fallback => Response::fallback(script, thread_index),
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("mode", &self.mode())
            .field("backend", &self.backend_name())
            .field("active", &self.active_count())
            .finish()
    }
}
