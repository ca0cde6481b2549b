//! Loads the `logloom-sample-plugin` cdylib through `PluginManager`.
//!
//! The library is built once per variant into the test scratch directory,
//! then copied into each test's plugin directory so every test maps its own
//! instance of the library's state.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde_json::{Value, json};
use tempfile::TempDir;
use tracing_test::traced_test;

use logloom_core::config::{FilterErrorPolicy, PluginSystemConfig};
use logloom_core::{LogLevel, LogRecord};
use logloom_plugin::PluginManager;
use logloom_plugin::prelude::*;

const SAMPLE_MANIFEST: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../logloom-sample-plugin/Cargo.toml"
);

fn build_sample(variant: &str, features: &[&str]) -> PathBuf {
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(variant);
    let mut cmd = Command::new(option_env!("CARGO").unwrap_or("cargo"));
    cmd.args(["build", "--quiet", "--manifest-path", SAMPLE_MANIFEST])
        .arg("--target-dir")
        .arg(&target_dir);
    if !features.is_empty() {
        cmd.arg("--features").arg(features.join(","));
    }
    let status = cmd.status().expect("run cargo");
    assert!(status.success(), "building the sample plugin failed");

    let library = target_dir
        .join("debug")
        .join(format!("{DLL_PREFIX}logloom_sample_plugin{DLL_SUFFIX}"));
    assert!(library.is_file(), "missing {}", library.display());
    library
}

fn sample_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY.get_or_init(|| build_sample("sample-plugin", &[]))
}

fn mismatched_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY.get_or_init(|| build_sample("sample-plugin-abi-mismatch", &["abi-mismatch"]))
}

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("plugins")).expect("plugins dir");
        Self { temp }
    }

    fn plugin_dir(&self) -> PathBuf {
        self.temp.path().join("plugins")
    }

    fn trace_file(&self) -> PathBuf {
        self.temp.path().join("sample-trace.log")
    }

    /// Copies `library` into the plugin directory as `c_sample`.
    fn install_library(&self, library: &Path) -> PathBuf {
        let dest = self
            .plugin_dir()
            .join(format!("{DLL_PREFIX}c_sample{DLL_SUFFIX}"));
        fs::copy(library, &dest).expect("copy library");
        dest
    }

    /// Copies `library` into a package directory that names it in
    /// `plugin.toml`.
    fn install_package(&self, library: &Path) -> PathBuf {
        let pkg = self.plugin_dir().join("c_pkg");
        fs::create_dir(&pkg).expect("package dir");
        let file = format!("{DLL_PREFIX}sample{DLL_SUFFIX}");
        fs::copy(library, pkg.join(&file)).expect("copy library");
        fs::write(
            pkg.join("plugin.toml"),
            format!("[plugin]\nlibrary = \"{file}\"\n"),
        )
        .expect("plugin.toml");
        pkg
    }

    /// Initializes a manager whose manifest configures `c_sample` with
    /// `settings` plus the trace file.
    fn manager(&self, policy: FilterErrorPolicy, settings: Value) -> PluginManager {
        let mut settings = settings;
        settings["trace_file"] = json!(self.trace_file().to_string_lossy());
        let manifest = self.temp.path().join("plugins.json");
        fs::write(
            &manifest,
            json!({ "plugin_configs": { "c_sample": settings } }).to_string(),
        )
        .expect("manifest");

        let config = PluginSystemConfig {
            include_default_paths: false,
            filter_error_policy: policy,
            ..Default::default()
        };
        let manager = PluginManager::new(config, PluginCatalog::new());
        manager
            .initialize(Some(&self.plugin_dir()), Some(&manifest))
            .expect("initialize");
        manager
    }

    fn events(&self) -> Vec<String> {
        fs::read_to_string(self.trace_file())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn record(level: LogLevel, message: &str) -> LogRecord {
    LogRecord::new(level, message)
}

#[test]
fn test_library_filter_reads_settings_through_helpers() {
    let fx = Fixture::new();
    let path = fx.install_library(sample_library());
    let manager = fx.manager(
        FilterErrorPolicy::FailOpen,
        json!({
            "min_level": 2,
            "keyword": "secret",
            "blocked": ["panic", "oom"]
        }),
    );
    assert_eq!(manager.load_all().unwrap(), 1);

    let instance = manager.get("c_sample").expect("registered");
    assert!(instance.enabled);
    assert_eq!(instance.source, path);
    assert_eq!(instance.plugin_type(), PluginType::Filter);
    assert_eq!(instance.descriptor.version, "1.2.0");
    assert_eq!(instance.descriptor.author, "Logloom Team");
    assert_eq!(manager.registry().unit_count(), 1);

    assert!(manager.run_filters(&record(LogLevel::Warn, "disk fine")));
    assert!(!manager.run_filters(&record(LogLevel::Info, "below minimum")));
    assert!(!manager.run_filters(&record(LogLevel::Error, "leaked secret")));
    assert!(!manager.run_filters(&record(LogLevel::Fatal, "kernel panic")));

    let verdict = manager.evaluate_filters(&record(LogLevel::Error, "oom killer"));
    assert!(!verdict.accepted);
    assert_eq!(verdict.rejected_by.as_deref(), Some("c_sample"));
    assert_eq!(verdict.result, Some(ProcessResult::Skip));
    assert_eq!(verdict.faults, 0);

    assert_eq!(
        fx.events(),
        vec![
            "init",
            "process:disk fine",
            "process:below minimum",
            "process:leaked secret",
            "process:kernel panic",
            "process:oom killer",
        ]
    );
}

#[test]
#[traced_test]
fn test_nonzero_init_status_registers_disabled() {
    let fx = Fixture::new();
    fx.install_library(sample_library());
    let manager = fx.manager(FilterErrorPolicy::FailOpen, json!({ "fail_init": "yes" }));

    let report = manager.load_all_with_report().unwrap();
    assert_eq!(report.initialized, 0);
    assert_eq!(report.failed_init, 1);

    let instance = manager.get("c_sample").expect("still registered");
    assert!(!instance.enabled);
    assert!(manager.get_by_type(PluginType::Filter).is_empty());
    assert!(manager.run_filters(&record(LogLevel::Error, "anything")));
    assert_eq!(fx.events(), vec!["init"]);
    assert!(logs_contain("init returned status 1"));
}

#[test]
#[traced_test]
fn test_unknown_result_code_is_a_fault() {
    let fx = Fixture::new();
    fx.install_library(sample_library());
    let manager = fx.manager(FilterErrorPolicy::FailOpen, json!({ "process_code": 7 }));
    assert_eq!(manager.load_all().unwrap(), 1);

    let verdict = manager.evaluate_filters(&record(LogLevel::Info, "odd"));
    assert!(verdict.accepted);
    assert_eq!(verdict.faults, 1);
    assert!(logs_contain("unknown result code 7"));
}

#[test]
fn test_unknown_result_code_rejects_when_fail_closed() {
    let fx = Fixture::new();
    fx.install_library(sample_library());
    let manager = fx.manager(FilterErrorPolicy::FailClosed, json!({ "process_code": 7 }));
    assert_eq!(manager.load_all().unwrap(), 1);

    let verdict = manager.evaluate_filters(&record(LogLevel::Info, "odd"));
    assert!(!verdict.accepted);
    assert_eq!(verdict.rejected_by.as_deref(), Some("c_sample"));
    assert_eq!(verdict.faults, 1);
}

#[test]
#[traced_test]
fn test_abi_mismatch_is_rejected() {
    let fx = Fixture::new();
    fx.install_library(mismatched_library());
    let manager = fx.manager(FilterErrorPolicy::FailOpen, json!({}));

    let report = manager.load_all_with_report().unwrap();
    assert_eq!(report.failed_units, 1);
    assert_eq!(report.initialized, 0);
    assert_eq!(manager.count(), 0);
    assert_eq!(manager.registry().unit_count(), 0);
    assert!(fx.events().is_empty());
    assert!(logs_contain("does not match host version"));
}

#[test]
fn test_package_library_shuts_down_before_unload() {
    let fx = Fixture::new();
    let pkg = fx.install_package(sample_library());
    let manager = fx.manager(FilterErrorPolicy::FailOpen, json!({ "keyword": "drop" }));
    assert_eq!(manager.load_all().unwrap(), 1);
    assert_eq!(manager.get("c_sample").unwrap().source, pkg);

    assert!(!manager.dispatch(&record(LogLevel::Info, "drop me")));
    assert!(manager.dispatch(&record(LogLevel::Info, "keep me")));

    // A disabled library plugin is skipped by dispatch but stays mapped.
    assert!(manager.set_enabled("c_sample", false));
    assert!(manager.dispatch(&record(LogLevel::Info, "drop quietly")));
    assert!(manager.set_enabled("c_sample", true));
    assert_eq!(manager.registry().unit_count(), 1);

    manager.unload_all();
    assert_eq!(manager.count(), 0);
    assert_eq!(manager.registry().unit_count(), 0);
    assert_eq!(
        fx.events(),
        vec!["init", "process:drop me", "process:keep me", "shutdown"]
    );
}
