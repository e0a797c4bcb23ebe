//! php_embed_bridge - request context and response bridge between an HTTP
//! host and an embedded PHP interpreter.
//!
//! The host fills a [`RequestContext`](sapi::RequestContext) (server
//! variables, POST body, document root), asks the [`Engine`](sapi::Engine)
//! to execute a script on a given thread index and gets back an immutable
//! [`Response`](sapi::Response) with status, raw header block and body.
//!
//! # Features
//!
//! - **Two execution modes**: the full interpreter (cargo feature `php-embed`,
//!   links libphp) or a fallback page reporting the request when no
//!   interpreter is compiled in
//! - **Per-thread isolation**: each worker thread owns its own context,
//!   keyed by thread index
//! - **Host callbacks**: output, headers, POST body, cookies, variables and
//!   interpreter log messages flow through [`HostCallbacks`](sapi::HostCallbacks)
//! - **HTTP front end**: hyper-based HTTP/1.1 + HTTP/2 server with a worker pool
//!
//! # Example
//!
//! ```rust,ignore
//! use php_embed_bridge::sapi::{Bridge, Engine, NoopCallbacks, RequestContext};
//!
//! let engine = Engine::new("8.3", Bridge::fallback())?;
//! engine.startup()?;
//!
//! let mut ctx = RequestContext::new()?;
//! ctx.set_thread_index(0);
//! ctx.add_server_var("REQUEST_METHOD", Some("GET"))?;
//!
//! let response = engine.execute(&mut ctx, "index.php", &NoopCallbacks)?;
//! assert_eq!(response.status(), 200);
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod executor;
pub mod logging;
pub mod php;
pub mod sapi;
pub mod server;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use executor::{EngineExecutor, ScriptExecutor};
pub use server::{Server, Site};
pub use types::{ScriptOutcome, ScriptRequest};
