//! HTTP front end.
//!
//! Requests are routed in order:
//!
//! 1. `/health`, `/healthz`, `/ready`, `/readyz`: answered by the server
//! 2. GET/HEAD of an existing static asset under the document root: served from disk
//! 3. everything else: the site's entry point through a [`ScriptExecutor`]
//!
//! Script requests are mapped to CGI-style `$_SERVER` variables, and the
//! bridge response's header block is turned back into HTTP headers.
//!
//! # Graceful Shutdown
//!
//! ```rust,ignore
//! server.trigger_shutdown();
//! server.wait_for_drain(Duration::from_secs(30)).await;
//! ```
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Server                   │
//! │  TcpListener ── accept loop              │
//! │        │                                 │
//! │        ▼                                 │
//! │  ConnectionContext (hyper auto, h1 + h2) │
//! │        │                                 │
//! │        ▼                                 │
//! │  ScriptExecutor ── worker pool ── Engine │
//! └──────────────────────────────────────────┘
//! ```

pub mod connection;
pub mod health;
pub mod request;
pub mod response;
pub mod routing;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::HeaderValue;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use connection::ConnectionContext;
pub use request::Site;

use crate::executor::ScriptExecutor;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP server bound to one address.
pub struct Server<E: ScriptExecutor> {
    listener: TcpListener,
    local_addr: SocketAddr,
    executor: Arc<E>,
    site: Arc<Site>,
    drain_timeout: Duration,
    static_cache_control: Option<HeaderValue>,
    started_at: Instant,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

impl<E: ScriptExecutor + 'static> Server<E> {
    /// Bind the listener. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr, site: Site, executor: Arc<E>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            executor,
            site: Arc::new(site),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            static_cache_control: None,
            started_at: Instant::now(),
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        })
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// `Cache-Control` value for static files. Invalid values are ignored.
    pub fn with_static_cache_control(mut self, value: Option<&str>) -> Self {
        self.static_cache_control = value.and_then(|v| match HeaderValue::from_str(v) {
            Ok(header) => Some(header),
            Err(_) => {
                warn!("Ignoring invalid static Cache-Control value: {:?}", v);
                None
            }
        });
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn executor(&self) -> Arc<E> {
        Arc::clone(&self.executor)
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Get current active connections count.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Accept connections until [`trigger_shutdown`](Self::trigger_shutdown).
    pub async fn run(&self) -> std::io::Result<()> {
        info!(
            "Server listening on http://{} (executor: {}, mode: {}, entry point: {})",
            self.local_addr,
            self.executor.name(),
            self.executor.mode(),
            self.site.entry_point()
        );

        let ctx = Arc::new(ConnectionContext {
            executor: Arc::clone(&self.executor),
            site: Arc::clone(&self.site),
            local_addr: self.local_addr,
            active_connections: Arc::clone(&self.active_connections),
            started_at: self.started_at,
            static_cache_control: self.static_cache_control.clone(),
        });

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            // Back off on descriptor exhaustion
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);

                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Stop accepting connections and ask open ones to close.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return; // Already initiated
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(50);

        loop {
            let active = self.active_connections();
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}
