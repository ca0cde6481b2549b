//! Configurable in-memory plugin for tests.
//!
//! Every call is appended to a shared [`CallLog`] as `"<hook>:<name>"`, so
//! tests can assert on ordering across several plugins.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use logloom_core::LogRecord;

use crate::contract::{LogPlugin, PluginDescriptor, PluginType, ProcessResult};
use crate::error::PluginError;
use crate::helpers::PluginHelpers;

/// Shared, ordered record of plugin calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// How a mock hook behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return normally.
    Succeed,
    /// Return an `Err`.
    Fail,
    /// Panic.
    Panic,
}

/// A plugin whose every hook is scripted.
#[derive(Debug)]
pub struct MockPlugin {
    descriptor: PluginDescriptor,
    result: ProcessResult,
    init: MockBehavior,
    process: MockBehavior,
    shutdown: MockBehavior,
    log: CallLog,
    enabled: AtomicBool,
    processed: AtomicUsize,
}

impl MockPlugin {
    /// A plugin that initializes, returns `Ok` for every record, and shuts
    /// down cleanly.
    pub fn new(name: impl Into<String>, plugin_type: PluginType) -> Self {
        Self {
            descriptor: PluginDescriptor::new(name, plugin_type),
            result: ProcessResult::Ok,
            init: MockBehavior::Succeed,
            process: MockBehavior::Succeed,
            shutdown: MockBehavior::Succeed,
            log: CallLog::default(),
            enabled: AtomicBool::new(true),
            processed: AtomicUsize::new(0),
        }
    }

    /// Records calls into `log`.
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Arc::clone(log);
        self
    }

    /// Result returned by a successful `process`.
    pub fn returning(mut self, result: ProcessResult) -> Self {
        self.result = result;
        self
    }

    /// Scripts `init`.
    pub fn on_init(mut self, behavior: MockBehavior) -> Self {
        self.init = behavior;
        self
    }

    /// Scripts `process`.
    pub fn on_process(mut self, behavior: MockBehavior) -> Self {
        self.process = behavior;
        self
    }

    /// Scripts `shutdown`.
    pub fn on_shutdown(mut self, behavior: MockBehavior) -> Self {
        self.shutdown = behavior;
        self
    }

    /// Last flag mirrored through `set_enabled`.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Number of `process` calls so far.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    fn record(&self, hook: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{hook}:{}", self.descriptor.name));
        }
    }

    fn act(
        &self,
        behavior: MockBehavior,
        err: impl FnOnce() -> PluginError,
    ) -> Result<(), PluginError> {
        match behavior {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Fail => Err(err()),
            MockBehavior::Panic => panic!("scripted panic in {}", self.descriptor.name),
        }
    }
}

impl LogPlugin for MockPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, _helpers: &PluginHelpers) -> Result<(), PluginError> {
        self.record("init");
        self.act(self.init, || PluginError::init(&self.descriptor.name, "scripted"))
    }

    fn process(&self, _record: &LogRecord) -> Result<ProcessResult, PluginError> {
        self.record("process");
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.act(self.process, || PluginError::process(&self.descriptor.name, "scripted"))?;
        Ok(self.result)
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        self.record("shutdown");
        self.act(self.shutdown, || PluginError::shutdown(&self.descriptor.name, "scripted"))
    }

    fn set_enabled(&self, enabled: bool) {
        self.record(if enabled { "enable" } else { "disable" });
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

/// Snapshot of a call log.
pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}
