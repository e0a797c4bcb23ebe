//! Logging configuration.

use super::parse::env_or;
use super::ConfigError;

/// Crate, interpreter and access log targets at info.
const DEFAULT_FILTER: &str = "php_embed_bridge=info,php=info,access=info";

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable `fmt` output.
    Text,
}

impl LogFormat {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "" | "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT".into(),
                message: format!("expected json or text, got '{}'", other),
            }),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    pub format: LogFormat,
    /// Service name for structured logging.
    pub service_name: String,
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: php_embed_bridge=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = resolve_log_filter(
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("RUST_LOG").ok().as_deref(),
        );
        Ok(Self {
            filter,
            format: LogFormat::parse(&env_or("LOG_FORMAT", "json"))?,
            service_name: env_or("SERVICE_NAME", "php_embed_bridge"),
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
            service_name: "php_embed_bridge".to_string(),
        }
    }
}

/// Priority: LOG_LEVEL > RUST_LOG > default (info)
fn resolve_log_filter(log_level: Option<&str>, rust_log: Option<&str>) -> String {
    if let Some(level) = log_level {
        let level = level.trim().to_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {
                return format!("php_embed_bridge={0},php={0},access={0}", level);
            }
            _ => {
                // Logging is not up yet
                eprintln!(
                    "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                    level
                );
            }
        }
    }

    match rust_log {
        Some(filter) if !filter.trim().is_empty() => filter.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}
