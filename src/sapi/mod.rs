//! Request context and response bridge.
//!
//! The host drives an embedded PHP interpreter one request at a time per
//! worker thread:
//!
//! ```rust,ignore
//! use php_embed_bridge::sapi::{Bridge, Engine, NoopCallbacks, RequestContext};
//!
//! let engine = Engine::new("8.3", Bridge::fallback())?;
//! engine.startup()?;
//!
//! let mut ctx = RequestContext::new()?;
//! ctx.set_thread_index(worker_id);
//! ctx.set_document_root(Some("/var/www/html"));
//! ctx.add_server_var("REQUEST_METHOD", Some("GET"))?;
//!
//! let response = engine.execute(&mut ctx, "index.php", &NoopCallbacks)?;
//! drop(ctx);
//! // response.status(), response.headers(), response.body()
//!
//! engine.shutdown();
//! ```
//!
//! All interpreter-side I/O is routed to a [`HostCallbacks`] implementation,
//! addressed by the context's thread index. Whether scripts really run is an
//! explicit [`ExecutionMode`] fixed when the [`Bridge`] is built; the
//! `php-embed` feature only decides whether [`PhpInterpreter`] exists.

pub mod bridge;
pub mod callbacks;
pub mod context;
pub mod error;
pub mod module;
pub mod response;
pub mod session;

#[cfg(feature = "php-embed")]
pub mod embed;
#[cfg(feature = "php-embed")]
mod ffi;

pub use bridge::{Bridge, ExecutionMode, Interpreter};
pub use callbacks::{HostCallbacks, LogType, NoopCallbacks};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use module::Engine;
pub use response::{parse_headers, Response, DEFAULT_HEADERS};
pub use session::{ActiveBinding, Session};

#[cfg(feature = "php-embed")]
pub use embed::PhpInterpreter;

/// Bridge for `mode`, or an error when the mode is not compiled in.
pub fn bridge_for_mode(mode: ExecutionMode) -> Result<Bridge> {
    match mode {
        ExecutionMode::Fallback => Ok(Bridge::fallback()),
        #[cfg(feature = "php-embed")]
        ExecutionMode::FullInterpreter => {
            Ok(Bridge::with_interpreter(Box::new(PhpInterpreter::new())))
        }
        #[cfg(not(feature = "php-embed"))]
        ExecutionMode::FullInterpreter => Err(Error::Startup(
            "full interpreter mode requires the php-embed feature".to_string(),
        )),
    }
}
