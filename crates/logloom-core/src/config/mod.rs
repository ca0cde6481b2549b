//! Application configuration schemas.
//!
//! The configuration is deserialized via the `config` crate from an
//! optional TOML file overlaid with `LOGLOOM__`-prefixed environment
//! variables. Each sub-module represents a logical configuration section.
//! The plugin manifest is a separate JSON document, see [`manifest`].

pub mod logging;
pub mod manifest;
pub mod plugin;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::manifest::PluginManifest;
pub use self::plugin::{FilterErrorPolicy, PluginSystemConfig, default_search_paths};

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Plugin system settings.
    pub plugins: PluginSystemConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and the environment.
    ///
    /// The file is optional; a missing file yields the defaults. Variables
    /// such as `LOGLOOM__PLUGINS__PLUGIN_DIR` override file values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), exists = path.exists(), "Loading configuration");
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOGLOOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
