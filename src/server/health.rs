//! Liveness and readiness endpoints.
//!
//! Answered by the server itself, before any script runs:
//!
//! - `/health`, `/healthz`: the process is up (always 200)
//! - `/ready`, `/readyz`: the executor accepts requests (200, else 503)

use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::request::SERVER_SOFTWARE;
use super::response::{error_response, HttpResponse};
use crate::executor::{PoolStats, ScriptExecutor};

/// Health endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheck {
    Liveness,
    Readiness,
}

impl HealthCheck {
    /// Check served at `path`, if any.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/health" | "/healthz" => Some(HealthCheck::Liveness),
            "/ready" | "/readyz" => Some(HealthCheck::Readiness),
            _ => None,
        }
    }
}

/// JSON body of a health response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// "ok", "ready" or "not_ready"
    pub status: &'static str,
    pub uptime_seconds: f64,
    pub mode: &'static str,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<PoolStats>,
}

impl HealthStatus {
    pub fn check<E: ScriptExecutor + ?Sized>(kind: HealthCheck, executor: &E, uptime: Duration) -> Self {
        let status = match kind {
            HealthCheck::Liveness => "ok",
            HealthCheck::Readiness if executor.is_ready() => "ready",
            HealthCheck::Readiness => "not_ready",
        };
        Self {
            status,
            uptime_seconds: uptime.as_secs_f64(),
            mode: executor.mode().as_str(),
            backend: executor.name(),
            workers: executor.pool_stats(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if self.status == "not_ready" {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }
}

/// Build the HTTP response for `check`.
pub fn health_response<E: ScriptExecutor + ?Sized>(
    check: HealthCheck,
    executor: &E,
    uptime: Duration,
) -> HttpResponse {
    let health = HealthStatus::check(check, executor, uptime);
    let body = match serde_json::to_vec(&health) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Failed to serialize health status: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = health.status_code();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_SOFTWARE));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;
    use crate::sapi::ExecutionMode;
    use crate::types::{ScriptOutcome, ScriptRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubExecutor {
        ready: AtomicBool,
    }

    #[async_trait]
    impl ScriptExecutor for StubExecutor {
        async fn execute(&self, _request: ScriptRequest) -> Result<ScriptOutcome, ExecutorError> {
            unreachable!("health checks never execute scripts")
        }

        fn name(&self) -> &'static str {
            "stub"
        }

        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Fallback
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_health_paths() {
        assert_eq!(HealthCheck::from_path("/health"), Some(HealthCheck::Liveness));
        assert_eq!(HealthCheck::from_path("/healthz"), Some(HealthCheck::Liveness));
        assert_eq!(HealthCheck::from_path("/ready"), Some(HealthCheck::Readiness));
        assert_eq!(HealthCheck::from_path("/readyz"), Some(HealthCheck::Readiness));
        assert_eq!(HealthCheck::from_path("/health/"), None);
        assert_eq!(HealthCheck::from_path("/"), None);
    }

    #[test]
    fn test_readiness_follows_executor() {
        let executor = StubExecutor {
            ready: AtomicBool::new(true),
        };

        let resp = health_response(HealthCheck::Readiness, &executor, Duration::from_secs(5));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

        executor.ready.store(false, Ordering::SeqCst);
        let resp = health_response(HealthCheck::Readiness, &executor, Duration::from_secs(5));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        // Liveness ignores readiness
        let resp = health_response(HealthCheck::Liveness, &executor, Duration::from_secs(5));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_status_json() {
        let executor = StubExecutor {
            ready: AtomicBool::new(false),
        };
        let health = HealthStatus::check(HealthCheck::Readiness, &executor, Duration::from_millis(1500));
        let json = serde_json::to_value(&health).unwrap();

        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["uptime_seconds"], 1.5);
        assert_eq!(json["mode"], ExecutionMode::Fallback.as_str());
        assert_eq!(json["backend"], "stub");
        assert!(json.get("workers").is_none());
    }
}
