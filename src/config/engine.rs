//! Engine configuration: execution mode, PHP version and extensions.

use std::path::PathBuf;

use super::parse::{env_auto, env_list, env_opt, env_or};
use super::ConfigError;
use crate::php::ExtensionConfig;
use crate::sapi::ExecutionMode;

/// Requested execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// Full interpreter when compiled in, fallback otherwise.
    #[default]
    Auto,
    Full,
    Fallback,
}

impl EngineMode {
    /// Parse `auto`, `full` or `fallback` (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(EngineMode::Auto),
            "full" => Ok(EngineMode::Full),
            "fallback" => Ok(EngineMode::Fallback),
            other => Err(ConfigError::Invalid {
                key: "ENGINE_MODE".into(),
                message: format!("expected auto, full or fallback, got '{}'", other),
            }),
        }
    }

    /// Concrete mode for this build.
    pub fn resolve(self) -> Result<ExecutionMode, ConfigError> {
        match self {
            EngineMode::Auto if ExecutionMode::full_available() => Ok(ExecutionMode::FullInterpreter),
            EngineMode::Auto | EngineMode::Fallback => Ok(ExecutionMode::Fallback),
            EngineMode::Full if ExecutionMode::full_available() => Ok(ExecutionMode::FullInterpreter),
            EngineMode::Full => Err(ConfigError::Invalid {
                key: "ENGINE_MODE".into(),
                message: "full mode requires a build with the php-embed feature".into(),
            }),
        }
    }
}

/// Engine configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Resolved execution mode.
    pub mode: ExecutionMode,
    /// Explicit PHP version; `None` selects from composer.json.
    pub php_version: Option<String>,
    /// Override for `/usr/local/lib/php/<version>/extensions`.
    pub extension_dir: Option<PathBuf>,
    pub extensions: ExtensionConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = EngineMode::parse(&env_or("ENGINE_MODE", "auto"))?.resolve()?;

        Ok(Self {
            mode,
            php_version: env_auto("PHP_VERSION"),
            extension_dir: env_opt("PHP_EXTENSION_DIR").map(PathBuf::from),
            extensions: ExtensionConfig {
                required: env_list("PHP_EXTENSIONS"),
                optional: env_list("PHP_EXTENSIONS_OPTIONAL"),
            },
        })
    }
}
