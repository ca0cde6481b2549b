//! Enablement and rank decisions derived from the manifest.

use std::collections::{HashMap, HashSet};

use logloom_core::config::PluginManifest;

/// Rank of every plugin the manifest does not order explicitly.
pub const LOWEST_PRIORITY: u32 = 999;

/// Decides which plugins load and in which order they run.
#[derive(Debug, Clone, Default)]
pub struct OrderingPolicy {
    enabled: HashSet<String>,
    disabled: HashSet<String>,
    ranks: HashMap<String, u32>,
}

impl OrderingPolicy {
    /// Builds a policy from allow-list, deny-list and explicit order.
    pub fn new<I, S>(enabled: I, disabled: I, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = HashMap::new();
        for (index, name) in order.into_iter().enumerate() {
            let rank = u32::try_from(index).unwrap_or(u32::MAX);
            // First occurrence wins when a name is listed twice.
            ranks.entry(name.into()).or_insert(rank);
        }
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
            disabled: disabled.into_iter().map(Into::into).collect(),
            ranks,
        }
    }

    /// Builds a policy from a manifest.
    pub fn from_manifest(manifest: &PluginManifest) -> Self {
        Self::new(
            manifest.enabled_plugins.iter().cloned(),
            manifest.disabled_plugins.iter().cloned(),
            manifest.plugin_order.iter().cloned(),
        )
    }

    /// Whether `name` may be loaded. The deny-list always wins; an empty
    /// allow-list admits everything.
    pub fn is_enabled(&self, name: &str) -> bool {
        if self.disabled.contains(name) {
            return false;
        }
        self.enabled.is_empty() || self.enabled.contains(name)
    }

    /// Explicit rank of `name`, or [`LOWEST_PRIORITY`].
    pub fn rank_of(&self, name: &str) -> u32 {
        self.ranks.get(name).copied().unwrap_or(LOWEST_PRIORITY)
    }
}
