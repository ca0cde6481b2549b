//! Drops records below a configured severity.

use std::sync::atomic::{AtomicI64, Ordering};

use logloom_plugin::prelude::*;

/// Plugin name and factory id.
pub const NAME: &str = "level_filter";

/// Severity threshold filter.
///
/// Settings: `min_level` (int, default 0 = debug).
#[derive(Debug)]
pub struct LevelFilter {
    descriptor: PluginDescriptor,
    min_level: AtomicI64,
}

impl LevelFilter {
    /// Creates the filter with a threshold of 0.
    pub fn new() -> Self {
        Self {
            descriptor: plugin_descriptor!(
                name: NAME,
                plugin_type: PluginType::Filter,
                version: "1.0.0",
                author: "Logloom Team",
                description: "Skips records below min_level"
            ),
            min_level: AtomicI64::new(LogLevel::Debug.as_i64()),
        }
    }

    /// Current threshold.
    pub fn min_level(&self) -> i64 {
        self.min_level.load(Ordering::Relaxed)
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPlugin for LevelFilter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, helpers: &PluginHelpers) -> Result<(), PluginError> {
        let min_level = helpers.get_int(NAME, "min_level", LogLevel::Debug.as_i64());
        self.min_level.store(min_level, Ordering::Relaxed);
        tracing::info!(plugin = NAME, min_level, "Level filter initialized");
        Ok(())
    }

    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError> {
        if record.level.as_i64() < self.min_level() {
            return Ok(ProcessResult::Skip);
        }
        Ok(ProcessResult::Ok)
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
