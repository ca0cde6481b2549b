//! Plugin manifest: search paths, enablement, ordering and per-plugin
//! settings, read from a JSON document.
//!
//! The manifest is passive data. Policy decisions derived from it live in
//! the plugin crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, ErrorKind};

/// Parsed plugin manifest. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    /// Extra search paths, appended after the defaults.
    pub plugin_paths: Vec<String>,
    /// Allow-list. Empty means every plugin not disabled is enabled.
    pub enabled_plugins: Vec<String>,
    /// Deny-list. Always wins over the allow-list.
    pub disabled_plugins: Vec<String>,
    /// Explicit dispatch order; the index is the plugin's rank.
    pub plugin_order: Vec<String>,
    /// Plugin name → settings object.
    pub plugin_configs: HashMap<String, Value>,
}

impl PluginManifest {
    /// Parses a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("invalid plugin manifest: {e}"),
                e,
            )
        })
    }

    /// Reads and parses a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("cannot read plugin manifest '{}': {e}", path.display()),
                e,
            )
        })?;
        Self::from_json(&text)
    }

    /// Settings objects keyed by plugin name, shared rather than copied.
    ///
    /// Entries whose value is not a JSON object are dropped; lookups for
    /// those plugins fall back to defaults.
    pub fn shared_configs(&self) -> HashMap<String, Arc<Map<String, Value>>> {
        self.plugin_configs
            .iter()
            .filter_map(|(name, value)| match value {
                Value::Object(map) => Some((name.clone(), Arc::new(map.clone()))),
                _ => None,
            })
            .collect()
    }
}
