//! TCP connection and request handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::path::{Path, PathBuf};
use std::time::Instant;

use http_body_util::BodyExt;
use http::header::HeaderValue;
use hyper::body::{Body, Incoming as IncomingBody};
use hyper::service::service_fn;
use hyper::{Method, Request};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::health::{health_response, HealthCheck};
use super::request::{build_script_request, protocol_name, Peer, Site};
use super::response::{
    bad_request, from_bridge_response, from_executor_error, serve_static_file, without_body,
    HttpResponse,
};
use super::routing::resolve_static_file;
use crate::executor::ScriptExecutor;

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("HeaderTimeout")
}

/// State shared by every connection of one server.
pub struct ConnectionContext<E: ScriptExecutor> {
    pub executor: Arc<E>,
    pub site: Arc<Site>,
    pub local_addr: SocketAddr,
    pub active_connections: Arc<AtomicUsize>,
    /// Server start, reported as health uptime
    pub started_at: Instant,
    /// `Cache-Control` for static files
    pub static_cache_control: Option<HeaderValue>,
}

impl<E: ScriptExecutor + 'static> ConnectionContext<E> {
    /// Serve one TCP connection (HTTP/1.1 or HTTP/2) until it closes.
    ///
    /// Once `shutdown_rx` flips, the connection finishes in-flight requests
    /// and closes (HTTP/2 GOAWAY, HTTP/1.1 no keep-alive).
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);

        let peer = Peer {
            remote_addr,
            local_addr: self.local_addr,
        };

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, peer).await }
        });

        let builder = auto::Builder::new(TokioExecutor::new());
        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let shutdown = async {
            if !*shutdown_rx.borrow_and_update() {
                // A dropped sender also means shutdown
                let _ = shutdown_rx.changed().await;
            }
        };

        let result = tokio::select! {
            res = conn.as_mut() => res,
            _ = shutdown => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };

        if let Err(err) = result {
            let err_str = format!("{:?}", err);
            if !is_connection_error(&err_str) {
                debug!("Connection error: {:?}", err);
            }
        }

        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    async fn handle_request(
        &self,
        req: Request<IncomingBody>,
        peer: Peer,
    ) -> Result<HttpResponse, Infallible> {
        let request_start = Instant::now();

        let (parts, body) = req.into_parts();
        let is_head = parts.method == Method::HEAD;
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(|q| q.to_string());
        let http_version = protocol_name(parts.version);

        let mut worker = None;
        let response = if let Some(check) = HealthCheck::from_path(&path) {
            health_response(check, self.executor.as_ref(), self.started_at.elapsed())
        } else if let Some(file) = self.static_file(&parts.method, &path) {
            serve_static_file(&file, self.static_cache_control.as_ref()).await
        } else {
            match body.collect().await {
                Ok(collected) => {
                    let request =
                        build_script_request(&parts, collected.to_bytes(), &peer, &self.site);
                    match self.executor.execute(request).await {
                        Ok(outcome) => {
                            worker = Some(outcome.thread_index);
                            from_bridge_response(outcome.response)
                        }
                        Err(e) => {
                            if e.is_queue_full() || e.is_timeout() || e.is_shutdown() {
                                warn!(error = %e, path = %path, "request rejected");
                            } else {
                                error!(error = %e, path = %path, "script execution failed");
                            }
                            from_executor_error(&e)
                        }
                    }
                }
                Err(e) => {
                    debug!("Failed to read request body: {}", e);
                    bad_request()
                }
            }
        };

        let response = if is_head {
            without_body(response)
        } else {
            response
        };

        let bytes = response.body().size_hint().exact().unwrap_or(0);
        tracing::info!(
            target: "access",
            method = %parts.method,
            path = %path,
            query = query.as_deref().unwrap_or(""),
            http = http_version,
            status = response.status().as_u16(),
            bytes = bytes,
            duration_ms = request_start.elapsed().as_secs_f64() * 1000.0,
            ip = %peer.remote_addr.ip(),
            worker = worker.unwrap_or(-1),
        );

        Ok(response)
    }

    /// Existing static asset for a GET or HEAD request.
    fn static_file(&self, method: &Method, path: &str) -> Option<PathBuf> {
        if *method != Method::GET && *method != Method::HEAD {
            return None;
        }
        resolve_static_file(Path::new(self.site.document_root()), path)
    }
}
