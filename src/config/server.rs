//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_auto, env_duration, env_opt, env_or};
use super::ConfigError;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Document root, also the project root for detection (default: /var/www/html).
    pub document_root: PathBuf,
    /// Script executed for every request; `None` means detect it.
    pub entry_point: Option<String>,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
    /// `Cache-Control` sent with static files (STATIC_CACHE_CONTROL, default: none).
    pub static_cache_control: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr: SocketAddr = raw.trim().parse().map_err(|e| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: raw.clone(),
            error: format!("{}", e),
        })?;

        let drain_timeout = env_duration("DRAIN_TIMEOUT", "30s")?.unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        Ok(Self {
            listen_addr,
            document_root: PathBuf::from(env_or("DOCUMENT_ROOT", "/var/www/html")),
            entry_point: env_auto("ENTRY_POINT"),
            drain_timeout,
            static_cache_control: env_opt("STATIC_CACHE_CONTROL"),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            document_root: PathBuf::from("/var/www/html"),
            entry_point: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            static_cache_control: None,
        }
    }
}
