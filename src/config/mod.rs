//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use php_embed_bridge::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Workers: {}", config.executor.worker_count());
//! ```

mod engine;
mod error;
mod executor;
mod logging;
mod parse;
mod server;

pub use engine::{EngineConfig, EngineMode};
pub use error::ConfigError;
pub use executor::ExecutorConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            engine: EngineConfig::from_env()?,
            executor: ExecutorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Document root: {:?}", self.server.document_root);
        info!(
            "  Entry point: {}",
            self.server.entry_point.as_deref().unwrap_or("auto")
        );
        info!("  Engine mode: {}", self.engine.mode);
        info!(
            "  PHP version: {}",
            self.engine.php_version.as_deref().unwrap_or("auto")
        );
        info!("  Workers: {}", self.executor.worker_count());
        info!("  Queue capacity: {}", self.executor.queue_capacity());

        match self.executor.request_timeout {
            Some(timeout) => info!("  Request timeout: {}s", timeout.as_secs()),
            None => info!("  Request timeout: disabled"),
        }
        info!("  Drain timeout: {}s", self.server.drain_timeout.as_secs());
        if let Some(ref cc) = self.server.static_cache_control {
            info!("  Static Cache-Control: {}", cc);
        }

        if !self.engine.extensions.is_empty() {
            info!(
                "  Extensions: required=[{}] optional=[{}]",
                self.engine.extensions.required.join(","),
                self.engine.extensions.optional.join(",")
            );
        }
        if let Some(ref dir) = self.engine.extension_dir {
            info!("  Extension dir: {:?}", dir);
        }
    }
}
