//! Plugin manager: the lifecycle facade over discovery, loading, the
//! registry and dispatch.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, info, warn};

use logloom_core::LogRecord;
use logloom_core::config::{PluginManifest, PluginSystemConfig, default_search_paths};
use logloom_core::error::AppResult;

use crate::catalog::PluginCatalog;
use crate::contract::{PluginDescriptor, PluginType};
use crate::discovery::Discoverer;
use crate::dispatcher::{Dispatcher, FilterVerdict};
use crate::error::{PluginError, guarded};
use crate::helpers::PluginHelpers;
use crate::loader::{LoadReport, Loader, UnitLoader, guarded_set_enabled};
use crate::ordering::OrderingPolicy;
use crate::registry::{PluginInstance, PluginRegistry};

#[derive(Debug, Default)]
struct Session {
    initialized: bool,
    search_paths: Vec<PathBuf>,
    policy: OrderingPolicy,
    helpers: PluginHelpers,
}

/// Manages the full lifecycle of plugins: initialize, load, enable,
/// dispatch, unload.
///
/// All methods take `&self`; share the manager behind an `Arc` to use it
/// from several threads.
#[derive(Debug)]
pub struct PluginManager {
    config: PluginSystemConfig,
    units: UnitLoader,
    registry: Arc<PluginRegistry>,
    dispatcher: Dispatcher,
    session: RwLock<Session>,
}

impl PluginManager {
    /// Creates an uninitialized manager.
    pub fn new(config: PluginSystemConfig, catalog: PluginCatalog) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.filter_error_policy);
        Self {
            config,
            units: UnitLoader::new(Arc::new(catalog)),
            registry,
            dispatcher,
            session: RwLock::new(Session::default()),
        }
    }

    /// Reads the manifest and computes the search paths.
    ///
    /// `plugin_dir` and `manifest_path` override the configured values. An
    /// unreadable or malformed manifest is logged and treated as empty.
    pub fn initialize(
        &self,
        plugin_dir: Option<&Path>,
        manifest_path: Option<&Path>,
    ) -> AppResult<()> {
        let manifest_path = manifest_path.or(self.config.manifest.as_deref());
        let manifest = match manifest_path {
            Some(path) => PluginManifest::from_path(path).unwrap_or_else(|e| {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load plugin manifest, using defaults"
                );
                PluginManifest::default()
            }),
            None => PluginManifest::default(),
        };
        self.initialize_with_manifest(plugin_dir, manifest)
    }

    /// Like [`initialize`](Self::initialize) with an already parsed
    /// manifest.
    pub fn initialize_with_manifest(
        &self,
        plugin_dir: Option<&Path>,
        manifest: PluginManifest,
    ) -> AppResult<()> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.initialized {
            warn!("Plugin system already initialized");
            return Ok(());
        }

        let plugin_dir = plugin_dir.or(self.config.plugin_dir.as_deref());
        let mut paths: Vec<PathBuf> = plugin_dir.map(Path::to_path_buf).into_iter().collect();
        if self.config.include_default_paths {
            paths.extend(default_search_paths());
        }
        paths.extend(manifest.plugin_paths.iter().map(PathBuf::from));
        let discoverer = Discoverer::new(paths);

        *session = Session {
            initialized: true,
            search_paths: discoverer.search_paths().to_vec(),
            policy: OrderingPolicy::from_manifest(&manifest),
            helpers: PluginHelpers::from_manifest(&manifest),
        };

        info!(
            search_paths = ?session.search_paths,
            enabled = manifest.enabled_plugins.len(),
            disabled = manifest.disabled_plugins.len(),
            ordered = manifest.plugin_order.len(),
            "Plugin system initialized"
        );
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has run since the last
    /// shutdown.
    pub fn is_initialized(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// Effective search paths, in precedence order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .search_paths
            .clone()
    }

    /// Config accessor built from the manifest.
    pub fn helpers(&self) -> PluginHelpers {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .helpers
            .clone()
    }

    /// Discovers and loads every plugin. Returns the number that
    /// initialized successfully.
    pub fn load_all(&self) -> AppResult<usize> {
        Ok(self.load_all_with_report()?.initialized)
    }

    /// Like [`load_all`](Self::load_all), with the full outcome counts.
    pub fn load_all_with_report(&self) -> AppResult<LoadReport> {
        let (search_paths, policy, helpers) = {
            let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
            if !session.initialized {
                return Err(PluginError::NotInitialized.into());
            }
            (
                session.search_paths.clone(),
                session.policy.clone(),
                session.helpers.clone(),
            )
        };

        let candidates = Discoverer::new(search_paths).discover();
        info!(candidates = candidates.len(), "Loading plugins");
        Ok(Loader::new(&self.units, &policy, &helpers, &self.registry).load_all(&candidates))
    }

    /// Shuts down every enabled plugin and empties the registry.
    pub fn unload_all(&self) {
        let (instances, units) = self.registry.drain();
        if instances.is_empty() && units.is_empty() {
            return;
        }

        for instance in instances.iter().filter(|i| i.enabled) {
            let name = instance.name();
            let result = guarded(
                || instance.plugin.shutdown(),
                |message| PluginError::shutdown(name, message),
            );
            match result {
                Ok(()) => info!(plugin = %name, "Plugin shut down"),
                Err(e) => error!(plugin = %name, error = %e, "Plugin shutdown failed"),
            }
        }

        let count = instances.len();
        drop(instances);
        drop(units);
        info!(count, "All plugins unloaded");
    }

    /// Unloads everything and returns to the uninitialized state. Calling
    /// it again, or before `initialize`, does nothing.
    pub fn shutdown(&self) {
        if !self.is_initialized() {
            return;
        }
        self.unload_all();
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        info!("Plugin system shut down");
    }

    /// Enables or disables a loaded plugin without reloading it. Returns
    /// `false` for unknown names.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.registry.set_enabled(name, enabled) {
            Some(plugin) => {
                guarded_set_enabled(plugin.as_ref(), enabled);
                info!(plugin = %name, enabled, "Plugin state changed");
                true
            }
            None => false,
        }
    }

    /// Snapshot of one plugin, enabled or not.
    pub fn get(&self, name: &str) -> Option<PluginInstance> {
        self.registry.get(name)
    }

    /// Descriptor of one plugin.
    pub fn get_info(&self, name: &str) -> Option<PluginDescriptor> {
        self.registry.descriptor(name)
    }

    /// Enabled plugins of one type, in dispatch order.
    pub fn get_by_type(&self, plugin_type: PluginType) -> Vec<PluginInstance> {
        self.registry.enabled_of_type(plugin_type)
    }

    /// Every loaded plugin, in dispatch order.
    pub fn list(&self) -> Vec<PluginInstance> {
        self.registry.list()
    }

    /// Number of loaded plugins.
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    /// See [`Dispatcher::run_filters`].
    pub fn run_filters(&self, record: &LogRecord) -> bool {
        self.dispatcher.run_filters(record)
    }

    /// See [`Dispatcher::evaluate_filters`].
    pub fn evaluate_filters(&self, record: &LogRecord) -> FilterVerdict {
        self.dispatcher.evaluate_filters(record)
    }

    /// See [`Dispatcher::run_sinks`].
    pub fn run_sinks(&self, record: &LogRecord) {
        self.dispatcher.run_sinks(record)
    }

    /// See [`Dispatcher::run_analysis`].
    pub fn run_analysis(&self, record: &LogRecord) {
        self.dispatcher.run_analysis(record)
    }

    /// See [`Dispatcher::dispatch`].
    pub fn dispatch(&self, record: &LogRecord) -> bool {
        self.dispatcher.dispatch(record)
    }

    /// The dispatcher, for callers that keep their own handle.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
