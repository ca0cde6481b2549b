//! Plugin registry: loaded instances, their state, and the units they came
//! from.
//!
//! A single `RwLock` guards everything. No plugin code ever runs while it
//! is held: callers get cloned snapshots and invoke plugins afterwards.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::contract::{LogPlugin, PluginDescriptor, PluginType};
use crate::error::PluginError;

/// A loaded plugin and its registry state.
#[derive(Debug, Clone)]
pub struct PluginInstance {
    /// Descriptor with the effective name filled in.
    pub descriptor: PluginDescriptor,
    /// The implementation.
    pub plugin: Arc<dyn LogPlugin>,
    /// Whether the dispatcher may call it.
    pub enabled: bool,
    /// Explicit rank; lower runs first.
    pub order: u32,
    /// Registration counter, the tie-break between equal ranks.
    pub sequence: u64,
    /// Shared settings from the manifest.
    pub config: Option<Arc<Map<String, Value>>>,
    /// Where the plugin was loaded from.
    pub source: PathBuf,
    /// Identifier of the originating unit.
    pub unit: String,
}

impl PluginInstance {
    /// Effective plugin name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Pipeline stage.
    pub fn plugin_type(&self) -> PluginType {
        self.descriptor.plugin_type
    }

    /// Serializable summary for listings.
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            descriptor: self.descriptor.clone(),
            enabled: self.enabled,
            order: self.order,
            source: self.source.clone(),
            unit: self.unit.clone(),
        }
    }

    fn sort_key(&self) -> (u32, u64) {
        (self.order, self.sequence)
    }
}

/// Listing entry for a loaded plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    /// Descriptor.
    pub descriptor: PluginDescriptor,
    /// Whether it is enabled.
    pub enabled: bool,
    /// Rank.
    pub order: u32,
    /// Load location.
    pub source: PathBuf,
    /// Originating unit.
    pub unit: String,
}

/// A loaded unit. Holding it keeps any backing library mapped.
pub struct LoadedUnit {
    /// Unique unit identifier.
    pub id: String,
    /// Library file or package directory.
    pub source: PathBuf,
    keepalive: Option<Arc<dyn Any + Send + Sync>>,
}

impl LoadedUnit {
    /// A unit with nothing to keep alive.
    pub fn new(id: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            keepalive: None,
        }
    }

    /// Attaches a resource released when the unit is dropped.
    pub fn with_keepalive(mut self, resource: Arc<dyn Any + Send + Sync>) -> Self {
        self.keepalive = Some(resource);
        self
    }
}

impl fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("keepalive", &self.keepalive.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    instances: HashMap<String, PluginInstance>,
    units: HashMap<String, LoadedUnit>,
    next_sequence: u64,
}

/// Registry of all loaded plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    state: RwLock<RegistryState>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an instance, assigning its sequence number.
    ///
    /// Fails with [`PluginError::DuplicateName`] if the name is taken; the
    /// existing entry is never replaced.
    pub fn register(&self, mut instance: PluginInstance) -> Result<u64, PluginError> {
        let mut state = self.write();
        if state.instances.contains_key(instance.name()) {
            return Err(PluginError::DuplicateName(instance.name().to_string()));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        instance.sequence = sequence;

        info!(
            plugin = %instance.name(),
            plugin_type = %instance.plugin_type(),
            version = %instance.descriptor.version,
            enabled = instance.enabled,
            order = instance.order,
            "Registering plugin"
        );
        state
            .instances
            .insert(instance.descriptor.name.clone(), instance);
        Ok(sequence)
    }

    /// Keeps a unit alive until the registry is drained.
    pub fn attach_unit(&self, unit: LoadedUnit) {
        let mut state = self.write();
        if state.units.contains_key(&unit.id) {
            warn!(unit = %unit.id, "Unit already attached");
            return;
        }
        state.units.insert(unit.id.clone(), unit);
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().instances.contains_key(name)
    }

    /// Snapshot of one instance.
    pub fn get(&self, name: &str) -> Option<PluginInstance> {
        self.read().instances.get(name).cloned()
    }

    /// Descriptor of one instance.
    pub fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.read()
            .instances
            .get(name)
            .map(|instance| instance.descriptor.clone())
    }

    /// Sets an instance's enabled flag. Returns the plugin so the caller
    /// can mirror the flag onto it outside the lock, or `None` for an
    /// unknown name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Option<Arc<dyn LogPlugin>> {
        let mut state = self.write();
        let instance = state.instances.get_mut(name)?;
        instance.enabled = enabled;
        Some(Arc::clone(&instance.plugin))
    }

    /// Enabled instances of one type, in dispatch order.
    pub fn enabled_of_type(&self, plugin_type: PluginType) -> Vec<PluginInstance> {
        let mut matching: Vec<PluginInstance> = self
            .read()
            .instances
            .values()
            .filter(|instance| instance.enabled && instance.plugin_type() == plugin_type)
            .cloned()
            .collect();
        matching.sort_by_key(PluginInstance::sort_key);
        matching
    }

    /// Every instance, enabled or not, in dispatch order.
    pub fn list(&self) -> Vec<PluginInstance> {
        let mut all: Vec<PluginInstance> = self.read().instances.values().cloned().collect();
        all.sort_by_key(PluginInstance::sort_key);
        all
    }

    /// Number of registered instances.
    pub fn count(&self) -> usize {
        self.read().instances.len()
    }

    /// Number of attached units.
    pub fn unit_count(&self) -> usize {
        self.read().units.len()
    }

    /// Empties the registry, returning its instances in dispatch order and
    /// its units. Drop the units only after the instances are finished.
    pub fn drain(&self) -> (Vec<PluginInstance>, Vec<LoadedUnit>) {
        let mut state = self.write();
        let mut instances: Vec<PluginInstance> =
            state.instances.drain().map(|(_, instance)| instance).collect();
        instances.sort_by_key(PluginInstance::sort_key);
        let units = state.units.drain().map(|(_, unit)| unit).collect();
        (instances, units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlugin;

    fn instance(name: &str, plugin_type: PluginType, order: u32) -> PluginInstance {
        let plugin = MockPlugin::new(name, plugin_type);
        PluginInstance {
            descriptor: plugin.descriptor().clone(),
            plugin: Arc::new(plugin),
            enabled: true,
            order,
            sequence: 0,
            config: None,
            source: PathBuf::from("/tmp/plugins"),
            unit: format!("{name}-unit"),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = PluginRegistry::new();
        registry.register(instance("a", PluginType::Filter, 999)).unwrap();
        let err = registry
            .register(instance("a", PluginType::Sink, 0))
            .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateName(ref n) if n == "a"));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("a").unwrap().plugin_type(), PluginType::Filter);
    }

    #[test]
    fn test_enabled_of_type_orders_by_rank_then_sequence() {
        let registry = PluginRegistry::new();
        registry.register(instance("late", PluginType::Sink, 999)).unwrap();
        registry.register(instance("first", PluginType::Sink, 0)).unwrap();
        registry.register(instance("later", PluginType::Sink, 999)).unwrap();
        registry.register(instance("filter", PluginType::Filter, 0)).unwrap();

        let names: Vec<_> = registry
            .enabled_of_type(PluginType::Sink)
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "late", "later"]);
    }

    #[test]
    fn test_set_enabled_excludes_from_snapshots() {
        let registry = PluginRegistry::new();
        registry.register(instance("a", PluginType::Analysis, 1)).unwrap();

        assert!(registry.set_enabled("a", false).is_some());
        assert!(registry.enabled_of_type(PluginType::Analysis).is_empty());
        assert!(!registry.get("a").unwrap().enabled);
        assert_eq!(registry.list().len(), 1);

        assert!(registry.set_enabled("missing", true).is_none());
    }

    #[test]
    fn test_drain_empties_everything() {
        let registry = PluginRegistry::new();
        registry.register(instance("b", PluginType::Sink, 5)).unwrap();
        registry.register(instance("a", PluginType::Sink, 1)).unwrap();
        registry.attach_unit(LoadedUnit::new("u-1", "/tmp/u"));
        registry.attach_unit(LoadedUnit::new("u-1", "/tmp/u"));
        assert_eq!(registry.unit_count(), 1);

        let (instances, units) = registry.drain();
        assert_eq!(instances[0].name(), "a");
        assert_eq!(units.len(), 1);
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.unit_count(), 0);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = instance("s", PluginType::Sink, 3).summary();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["descriptor"]["plugin_type"], "sink");
        assert_eq!(json["order"], 3);
    }
}
