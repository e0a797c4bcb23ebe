//! Bridge error types.

use std::fmt;

use crate::php::ExtensionError;

/// Errors returned by the request context, the bridge and the engine lifecycle.
#[derive(Debug)]
pub enum Error {
    /// A required argument was absent or empty. Nothing was mutated.
    InvalidArgument(&'static str),

    /// The worker thread index already has an active context bound to it.
    ThreadBusy { thread_index: i32 },

    /// An allocation could not be satisfied.
    ResourceExhausted {
        what: &'static str,
        requested: usize,
    },

    /// `execute` was called before `startup`.
    NotStarted,

    /// The interpreter failed to initialize.
    Startup(String),

    /// Requested interpreter version is not supported.
    UnsupportedVersion(String),

    /// A required extension could not be loaded.
    Extension(ExtensionError),
}

impl Error {
    /// Returns true for usage errors (absent or empty required argument, busy thread index).
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::ThreadBusy { .. })
    }

    /// Returns true if an allocation failed.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }

    pub(crate) fn alloc(what: &'static str, requested: usize) -> Self {
        Error::ResourceExhausted { what, requested }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::ThreadBusy { thread_index } => {
                write!(f, "thread index {} already has an active context", thread_index)
            }
            Error::ResourceExhausted { what, requested } => {
                write!(f, "allocation failed for {} ({} bytes)", what, requested)
            }
            Error::NotStarted => write!(f, "engine not started"),
            Error::Startup(msg) => write!(f, "engine startup failed: {}", msg),
            Error::UnsupportedVersion(v) => write!(f, "unsupported PHP version: {}", v),
            Error::Extension(e) => write!(f, "loading extensions: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Extension(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExtensionError> for Error {
    fn from(e: ExtensionError) -> Self {
        Error::Extension(e)
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
