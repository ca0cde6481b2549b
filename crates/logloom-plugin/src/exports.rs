//! The set of plugins a single loaded unit hands to the engine.

use std::sync::Arc;

use crate::contract::LogPlugin;

/// Plugins exported by one unit, in declaration order.
#[derive(Debug, Default)]
pub struct PluginExport {
    /// The exported plugin instances.
    pub plugins: Vec<Arc<dyn LogPlugin>>,
}

impl PluginExport {
    /// Creates an empty export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an export holding one plugin.
    pub fn single(plugin: impl LogPlugin + 'static) -> Self {
        Self::new().with_plugin(plugin)
    }

    /// Adds a plugin.
    pub fn with_plugin(mut self, plugin: impl LogPlugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Whether the unit exported nothing.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Number of exported plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}
