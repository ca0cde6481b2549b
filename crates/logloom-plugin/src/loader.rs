//! Turns discovered candidates into registered plugin instances.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::PluginCatalog;
use crate::contract::LogPlugin;
use crate::discovery::{Candidate, CandidateKind, PACKAGE_MANIFEST};
use crate::error::{PluginError, guarded};
use crate::exports::PluginExport;
use crate::helpers::PluginHelpers;
use crate::ordering::OrderingPolicy;
use crate::registry::{LoadedUnit, PluginInstance, PluginRegistry};

/// Parsed `plugin.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    /// The `[plugin]` table.
    pub plugin: PackageEntry,
}

/// Where a package's plugins come from. Exactly one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageEntry {
    /// Name of a statically linked factory.
    pub factory: Option<String>,
    /// Shared library file, relative to the package directory.
    pub library: Option<String>,
}

/// Resolved package entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// Build plugins from a catalog factory.
    Factory(String),
    /// Open a shared library.
    Library(PathBuf),
}

impl PackageManifest {
    /// Reads `<dir>/plugin.toml`.
    pub fn from_dir(dir: &Path) -> Result<Self, PluginError> {
        let path = dir.join(PACKAGE_MANIFEST);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| PluginError::load(dir, format!("cannot read {PACKAGE_MANIFEST}: {e}")))?;
        Self::parse(dir, &text)
    }

    /// Parses manifest text belonging to package `dir`.
    pub fn parse(dir: &Path, text: &str) -> Result<Self, PluginError> {
        toml::from_str(text)
            .map_err(|e| PluginError::load(dir, format!("invalid {PACKAGE_MANIFEST}: {e}")))
    }

    /// Resolves the entry against the package directory.
    pub fn source(&self, dir: &Path) -> Result<PackageSource, PluginError> {
        match (&self.plugin.factory, &self.plugin.library) {
            (Some(factory), None) => Ok(PackageSource::Factory(factory.clone())),
            (None, Some(library)) => Ok(PackageSource::Library(dir.join(library))),
            (Some(_), Some(_)) => Err(PluginError::load(
                dir,
                "[plugin] sets both 'factory' and 'library'",
            )),
            (None, None) => Err(PluginError::load(
                dir,
                "[plugin] needs either 'factory' or 'library'",
            )),
        }
    }
}

/// Opens single candidates.
#[derive(Debug, Clone)]
pub struct UnitLoader {
    catalog: Arc<PluginCatalog>,
}

impl UnitLoader {
    /// Creates a loader resolving factories from `catalog`.
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self { catalog }
    }

    /// Loads one candidate under a fresh unit id and returns the unit with
    /// its exported plugins. An empty export is an error.
    pub fn load(&self, candidate: &Candidate) -> Result<(LoadedUnit, PluginExport), PluginError> {
        let stem = candidate.stem();
        let unit = LoadedUnit::new(format!("{stem}-{}", Uuid::new_v4()), &candidate.path);

        let (unit, export) = match candidate.kind {
            CandidateKind::Package => {
                let manifest = PackageManifest::from_dir(&candidate.path)?;
                match manifest.source(&candidate.path)? {
                    PackageSource::Factory(id) => {
                        (unit, self.build_from_factory(&candidate.path, &id)?)
                    }
                    PackageSource::Library(path) => self.open_library(unit, &path, &stem)?,
                }
            }
            CandidateKind::Library => self.open_library(unit, &candidate.path, &stem)?,
        };

        if export.is_empty() {
            return Err(PluginError::load(&candidate.path, "unit exports no plugin"));
        }
        debug!(unit = %unit.id, plugins = export.len(), "Unit loaded");
        Ok((unit, export))
    }

    fn build_from_factory(&self, path: &Path, id: &str) -> Result<PluginExport, PluginError> {
        let factory = self
            .catalog
            .get(id)
            .ok_or_else(|| PluginError::load(path, format!("unknown factory '{id}'")))?;
        guarded(
            || Ok(factory()),
            |message| PluginError::load(path, format!("factory '{id}' {message}")),
        )
    }

    #[cfg(feature = "dynamic")]
    fn open_library(
        &self,
        unit: LoadedUnit,
        path: &Path,
        stem: &str,
    ) -> Result<(LoadedUnit, PluginExport), PluginError> {
        use crate::ffi::LibraryPlugin;

        // SAFETY: plugin directories are trusted by configuration.
        let plugin = unsafe { LibraryPlugin::open(path, stem) }?;
        let unit = unit.with_keepalive(plugin.library());
        Ok((unit, PluginExport::single(plugin)))
    }

    #[cfg(not(feature = "dynamic"))]
    fn open_library(
        &self,
        _unit: LoadedUnit,
        path: &Path,
        _stem: &str,
    ) -> Result<(LoadedUnit, PluginExport), PluginError> {
        Err(PluginError::load(
            path,
            "shared-library plugins need the 'dynamic' feature",
        ))
    }
}

/// Outcome counts of one loading pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Plugins registered and initialized.
    pub initialized: usize,
    /// Plugins registered but disabled because `init` failed.
    pub failed_init: usize,
    /// Plugins skipped by the enable/disable lists.
    pub skipped_disabled: usize,
    /// Plugins dropped because their name was taken.
    pub duplicates: usize,
    /// Candidates that could not be loaded.
    pub failed_units: usize,
}

/// Loads candidates into a registry, applying enablement, ordering and
/// config.
#[derive(Debug)]
pub struct Loader<'a> {
    units: &'a UnitLoader,
    policy: &'a OrderingPolicy,
    helpers: &'a PluginHelpers,
    registry: &'a PluginRegistry,
}

impl<'a> Loader<'a> {
    /// Creates a loader for one pass.
    pub fn new(
        units: &'a UnitLoader,
        policy: &'a OrderingPolicy,
        helpers: &'a PluginHelpers,
        registry: &'a PluginRegistry,
    ) -> Self {
        Self {
            units,
            policy,
            helpers,
            registry,
        }
    }

    /// Loads every candidate in order. Failures are logged and counted;
    /// none stops the pass.
    pub fn load_all(&self, candidates: &[Candidate]) -> LoadReport {
        let mut report = LoadReport::default();

        for candidate in candidates {
            let (unit, export) = match self.units.load(candidate) {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!(
                        path = %candidate.path.display(),
                        error = %e,
                        "Failed to load plugin unit"
                    );
                    report.failed_units += 1;
                    continue;
                }
            };

            let stem = candidate.stem();
            let mut registered = 0;
            for plugin in export.plugins {
                if self.load_plugin(plugin, &stem, &unit, &mut report) {
                    registered += 1;
                }
            }

            if registered > 0 {
                self.registry.attach_unit(unit);
            } else {
                debug!(unit = %unit.id, "No plugin from unit was registered, releasing it");
            }
        }

        info!(
            initialized = report.initialized,
            failed_init = report.failed_init,
            skipped_disabled = report.skipped_disabled,
            duplicates = report.duplicates,
            failed_units = report.failed_units,
            "Plugin loading finished"
        );
        report
    }

    /// Returns whether the plugin was registered.
    fn load_plugin(
        &self,
        plugin: Arc<dyn LogPlugin>,
        stem: &str,
        unit: &LoadedUnit,
        report: &mut LoadReport,
    ) -> bool {
        let mut descriptor = plugin.descriptor().clone();
        if descriptor.name.is_empty() {
            descriptor.name = stem.to_string();
        }
        let name = descriptor.name.clone();

        if !self.policy.is_enabled(&name) {
            info!(plugin = %name, "Plugin disabled by manifest, skipping");
            report.skipped_disabled += 1;
            return false;
        }

        if self.registry.contains(&name) {
            warn!(
                plugin = %name,
                path = %unit.source.display(),
                "Duplicate plugin name, keeping the first"
            );
            report.duplicates += 1;
            return false;
        }

        let init = guarded(
            || plugin.init(self.helpers),
            |message| PluginError::init(&name, message),
        );
        let enabled = match init {
            Ok(()) => true,
            Err(e) => {
                error!(plugin = %name, error = %e, "Plugin init failed, registering it disabled");
                false
            }
        };

        let instance = PluginInstance {
            descriptor,
            plugin: Arc::clone(&plugin),
            enabled,
            order: self.policy.rank_of(&name),
            sequence: 0,
            config: self.helpers.plugin_config(&name),
            source: unit.source.clone(),
            unit: unit.id.clone(),
        };

        match self.registry.register(instance) {
            Ok(_) => {
                if enabled {
                    report.initialized += 1;
                } else {
                    report.failed_init += 1;
                    guarded_set_enabled(plugin.as_ref(), false);
                }
                true
            }
            Err(e) => {
                // Lost a race with a concurrent load of the same name.
                warn!(plugin = %name, error = %e, "Plugin rejected by registry");
                report.duplicates += 1;
                if enabled {
                    let result =
                        guarded(|| plugin.shutdown(), |m| PluginError::shutdown(&name, m));
                    if let Err(e) = result {
                        error!(plugin = %name, error = %e, "Plugin shutdown failed");
                    }
                }
                false
            }
        }
    }
}

pub(crate) fn guarded_set_enabled(plugin: &dyn LogPlugin, enabled: bool) {
    let name = &plugin.descriptor().name;
    let result = guarded(
        || {
            plugin.set_enabled(enabled);
            Ok(())
        },
        |m| PluginError::process(name, m),
    );
    if let Err(e) = result {
        error!(plugin = %name, error = %e, "Plugin panicked in set_enabled");
    }
}
