//! Plugin system configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Working-directory plugin path, searched right after the custom path.
pub const LOCAL_PLUGIN_DIR: &str = "./plugins";

/// System-wide plugin path, searched last among the defaults.
pub const SYSTEM_PLUGIN_DIR: &str = "/usr/lib/logloom/plugins";

/// How the dispatcher treats a filter plugin that faults while processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterErrorPolicy {
    /// A faulting filter counts as having accepted the record.
    #[default]
    FailOpen,
    /// A faulting filter rejects the record.
    FailClosed,
}

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSystemConfig {
    /// Custom plugin directory, searched before every default path.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    /// Path to the JSON plugin manifest.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    /// Whether the local, user-level and system-level defaults are searched.
    #[serde(default = "default_true")]
    pub include_default_paths: bool,
    /// Fault handling for filter plugins.
    #[serde(default)]
    pub filter_error_policy: FilterErrorPolicy,
}

impl Default for PluginSystemConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            manifest: None,
            include_default_paths: true,
            filter_error_policy: FilterErrorPolicy::default(),
        }
    }
}

/// Default search paths in precedence order: local, user-level, system-level.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_PLUGIN_DIR)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local/lib/logloom/plugins"));
    }
    paths.push(PathBuf::from(SYSTEM_PLUGIN_DIR));
    paths
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_search_paths_order() {
        let paths = default_search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(LOCAL_PLUGIN_DIR)));
        assert_eq!(paths.last(), Some(&PathBuf::from(SYSTEM_PLUGIN_DIR)));
    }

    #[test]
    fn test_policy_defaults_to_fail_open() {
        assert_eq!(FilterErrorPolicy::default(), FilterErrorPolicy::FailOpen);
        let policy: FilterErrorPolicy = serde_json::from_str("\"fail_closed\"").expect("parse");
        assert_eq!(policy, FilterErrorPolicy::FailClosed);
    }
}
