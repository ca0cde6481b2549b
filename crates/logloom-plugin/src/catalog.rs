//! Statically linked plugin factories, referenced by name from package
//! manifests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::exports::PluginExport;

/// Builds a fresh export each time a package naming it is loaded.
pub type PluginFactory = Arc<dyn Fn() -> PluginExport + Send + Sync>;

/// Name → factory table for plugins compiled into the host.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `id`. Returns `false`, keeping the
    /// existing entry, if the id is taken.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> PluginExport + Send + Sync + 'static,
    {
        let id = id.into();
        if self.factories.contains_key(&id) {
            warn!(factory = %id, "Plugin factory already registered, keeping the first");
            return false;
        }
        self.factories.insert(id, Arc::new(factory));
        true
    }

    /// Looks up a factory.
    pub fn get(&self, id: &str) -> Option<PluginFactory> {
        self.factories.get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("factories", &self.ids())
            .finish()
    }
}
