//! Typed, read-only access to per-plugin settings from the manifest.
//!
//! Every getter is total: a missing plugin, a missing key, or a value that
//! cannot be coerced yields the caller's default.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use logloom_core::config::PluginManifest;

/// Settings objects keyed by plugin name.
pub type ConfigMap = HashMap<String, Arc<Map<String, Value>>>;

/// Config accessor handed to plugins in `init`.
///
/// Cheap to clone; all clones share the same settings.
#[derive(Debug, Clone, Default)]
pub struct PluginHelpers {
    configs: Arc<ConfigMap>,
}

impl PluginHelpers {
    /// Builds an accessor over already-extracted settings.
    pub fn new(configs: ConfigMap) -> Self {
        Self {
            configs: Arc::new(configs),
        }
    }

    /// Builds an accessor over a manifest's `plugin_configs`.
    pub fn from_manifest(manifest: &PluginManifest) -> Self {
        Self::new(manifest.shared_configs())
    }

    /// The shared settings object for `plugin`, if the manifest has one.
    pub fn plugin_config(&self, plugin: &str) -> Option<Arc<Map<String, Value>>> {
        self.configs.get(plugin).cloned()
    }

    fn lookup(&self, plugin: &str, key: &str) -> Option<&Value> {
        self.configs.get(plugin).and_then(|map| map.get(key))
    }

    /// Integer setting.
    pub fn get_int(&self, plugin: &str, key: &str, default: i64) -> i64 {
        self.lookup(plugin, key).and_then(coerce_int).unwrap_or(default)
    }

    /// String setting.
    pub fn get_string(&self, plugin: &str, key: &str, default: &str) -> String {
        self.lookup(plugin, key)
            .and_then(coerce_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Boolean setting.
    pub fn get_bool(&self, plugin: &str, key: &str, default: bool) -> bool {
        self.lookup(plugin, key)
            .and_then(coerce_bool)
            .unwrap_or(default)
    }

    /// String-list setting.
    pub fn get_string_list(&self, plugin: &str, key: &str, default: &[&str]) -> Vec<String> {
        self.lookup(plugin, key)
            .and_then(coerce_string_list)
            .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
    }

    /// Accessor bound to a single plugin name.
    pub fn scoped(&self, plugin: impl Into<String>) -> ScopedConfig {
        ScopedConfig {
            helpers: self.clone(),
            plugin: plugin.into(),
        }
    }
}

/// [`PluginHelpers`] bound to one plugin's settings.
#[derive(Debug, Clone)]
pub struct ScopedConfig {
    helpers: PluginHelpers,
    plugin: String,
}

impl ScopedConfig {
    /// Plugin whose settings this reads.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Integer setting.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.helpers.get_int(&self.plugin, key, default)
    }

    /// String setting.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.helpers.get_string(&self.plugin, key, default)
    }

    /// Boolean setting.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.helpers.get_bool(&self.plugin, key, default)
    }

    /// String-list setting.
    pub fn get_string_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.helpers.get_string_list(&self.plugin, key, default)
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f.trunc() as i64)
            }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.to_ascii_lowercase();
            Some(matches!(s.as_str(), "true" | "yes" | "1" | "on"))
        }
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        _ => None,
    }
}

fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(coerce_string).collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn helpers() -> PluginHelpers {
        let manifest = PluginManifest::from_json(
            &json!({
                "plugin_configs": {
                    "p": {
                        "n": 7,
                        "neg": -3,
                        "float": 2.9,
                        "numeric_text": " 42 ",
                        "word": "seven",
                        "flag_yes": "YES",
                        "flag_off": "off",
                        "flag_num": 0,
                        "flag_bool": true,
                        "name": "sink",
                        "list": ["a", 2, true, null, {"x": 1}],
                        "not_list": "a"
                    },
                    "scalar": 5
                }
            })
            .to_string(),
        )
        .expect("manifest");
        PluginHelpers::from_manifest(&manifest)
    }

    #[test]
    fn test_int_coercions() {
        let h = helpers();
        assert_eq!(h.get_int("p", "n", 0), 7);
        assert_eq!(h.get_int("p", "neg", 0), -3);
        assert_eq!(h.get_int("p", "float", 0), 2);
        assert_eq!(h.get_int("p", "numeric_text", 0), 42);
        assert_eq!(h.get_int("p", "word", 9), 9);
        assert_eq!(h.get_int("p", "flag_bool", 9), 1);
        assert_eq!(h.get_int("p", "list", 9), 9);
    }

    #[test]
    fn test_bool_coercions() {
        let h = helpers();
        assert!(h.get_bool("p", "flag_yes", false));
        assert!(!h.get_bool("p", "flag_off", true));
        assert!(!h.get_bool("p", "flag_num", true));
        assert!(h.get_bool("p", "n", false));
        assert!(h.get_bool("p", "flag_bool", false));
        assert!(h.get_bool("p", "list", true));
    }

    #[test]
    fn test_string_and_list_coercions() {
        let h = helpers();
        assert_eq!(h.get_string("p", "name", "x"), "sink");
        assert_eq!(h.get_string("p", "n", "x"), "7");
        assert_eq!(h.get_string("p", "list", "x"), "x");
        assert_eq!(h.get_string_list("p", "list", &[]), vec!["a", "2", "true"]);
        assert_eq!(h.get_string_list("p", "not_list", &["d"]), vec!["d"]);
    }

    #[test]
    fn test_missing_plugin_or_key_uses_default() {
        let h = helpers();
        assert_eq!(h.get_int("nobody", "n", 11), 11);
        assert_eq!(h.get_string("p", "missing", "def"), "def");
        assert_eq!(h.get_int("scalar", "anything", 4), 4);
        assert!(h.plugin_config("scalar").is_none());
        assert!(h.plugin_config("p").is_some());
    }

    #[test]
    fn test_scoped_reads_one_plugin() {
        let scoped = helpers().scoped("p");
        assert_eq!(scoped.plugin(), "p");
        assert_eq!(scoped.get_int("n", 0), 7);
        assert_eq!(scoped.get_string("name", ""), "sink");
        assert!(scoped.get_bool("flag_yes", false));
        assert_eq!(scoped.get_string_list("missing", &["z"]), vec!["z"]);
    }

    #[test]
    fn test_config_is_shared_not_copied() {
        let h = helpers();
        let a = h.plugin_config("p").expect("config");
        let b = h.clone().plugin_config("p").expect("config");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
