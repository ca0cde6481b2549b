//! Enumerates loadable plugin candidates across the search paths.
//!
//! Discovery only lists locations; it never opens a candidate.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PluginError;

/// Entry manifest that marks a directory as a plugin package.
pub const PACKAGE_MANIFEST: &str = "plugin.toml";

/// What kind of unit a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A shared library speaking the C plugin ABI.
    Library,
    /// A directory holding a `plugin.toml`.
    Package,
}

/// A location that may hold plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Unit kind.
    pub kind: CandidateKind,
    /// Library file or package directory.
    pub path: PathBuf,
}

impl Candidate {
    /// Short name of the unit: the file name without extension and, for
    /// libraries, without the platform `lib` prefix.
    pub fn stem(&self) -> String {
        let stem = match self.kind {
            CandidateKind::Library => self.path.file_stem(),
            CandidateKind::Package => self.path.file_name(),
        }
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

        match self.kind {
            CandidateKind::Library if !DLL_PREFIX.is_empty() => stem
                .strip_prefix(DLL_PREFIX)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(stem),
            _ => stem,
        }
    }
}

/// Walks search paths in precedence order.
#[derive(Debug, Clone, Default)]
pub struct Discoverer {
    search_paths: Vec<PathBuf>,
}

impl Discoverer {
    /// Creates a discoverer over `search_paths`, dropping repeats.
    pub fn new(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::new();
        for path in search_paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self {
            search_paths: unique,
        }
    }

    /// The effective search paths.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Lists candidates from every search path, in order.
    ///
    /// Missing or unreadable paths are logged and skipped.
    pub fn discover(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for path in &self.search_paths {
            if !path.is_dir() {
                debug!(path = %path.display(), "Plugin path does not exist, skipping");
                continue;
            }
            match scan_dir(path) {
                Ok(found) => {
                    debug!(path = %path.display(), count = found.len(), "Scanned plugin path");
                    candidates.extend(found);
                }
                Err(e) => warn!(error = %e, "Skipping plugin path"),
            }
        }
        candidates
    }
}

/// Lists the candidates directly inside `dir`: libraries first, then
/// packages, each group sorted by file name.
pub fn scan_dir(dir: &Path) -> Result<Vec<Candidate>, PluginError> {
    let entries = fs::read_dir(dir).map_err(|e| PluginError::Discovery {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut libraries = Vec::new();
    let mut packages = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if path.join(PACKAGE_MANIFEST).is_file() {
                packages.push((name, path));
            }
        } else if path.extension().is_some_and(|ext| ext == DLL_EXTENSION) {
            libraries.push((name, path));
        }
    }

    libraries.sort();
    packages.sort();

    let libraries = libraries.into_iter().map(|(_, path)| Candidate {
        kind: CandidateKind::Library,
        path,
    });
    let packages = packages.into_iter().map(|(_, path)| Candidate {
        kind: CandidateKind::Package,
        path,
    });
    Ok(libraries.chain(packages).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(dir: &Path, name: &str) {
        let pkg = dir.join(name);
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(PACKAGE_MANIFEST), "[plugin]\nfactory = \"x\"\n").unwrap();
    }

    fn library_name(stem: &str) -> String {
        format!("{DLL_PREFIX}{stem}.{DLL_EXTENSION}")
    }

    #[test]
    fn test_scan_orders_libraries_then_packages() {
        let temp = tempfile::tempdir().unwrap();
        package(temp.path(), "b_pkg");
        package(temp.path(), "a_pkg");
        fs::write(temp.path().join(library_name("zeta")), b"").unwrap();
        fs::write(temp.path().join(library_name("alpha")), b"").unwrap();

        let found = scan_dir(temp.path()).unwrap();
        let stems: Vec<_> = found.iter().map(Candidate::stem).collect();
        assert_eq!(stems, vec!["alpha", "zeta", "a_pkg", "b_pkg"]);
        assert_eq!(found[0].kind, CandidateKind::Library);
        assert_eq!(found[3].kind, CandidateKind::Package);
    }

    #[test]
    fn test_scan_ignores_private_and_unrelated_entries() {
        let temp = tempfile::tempdir().unwrap();
        package(temp.path(), "_hidden");
        package(temp.path(), ".dot");
        fs::create_dir(temp.path().join("no_manifest")).unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(temp.path().join(format!("_private.{DLL_EXTENSION}")), b"").unwrap();

        assert!(scan_dir(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_dir_is_discovery_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = scan_dir(&temp.path().join("gone")).unwrap_err();
        assert!(matches!(err, PluginError::Discovery { .. }));
    }

    #[test]
    fn test_discover_follows_path_precedence_and_skips_missing() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        package(first.path(), "z_first");
        package(second.path(), "a_second");

        let discoverer = Discoverer::new(vec![
            first.path().to_path_buf(),
            first.path().join("missing"),
            second.path().to_path_buf(),
            first.path().to_path_buf(),
        ]);
        assert_eq!(discoverer.search_paths().len(), 3);

        let stems: Vec<_> = discoverer.discover().iter().map(Candidate::stem).collect();
        assert_eq!(stems, vec!["z_first", "a_second"]);
    }
}
