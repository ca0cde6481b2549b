//! Counts accepted records per level.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use logloom_plugin::prelude::*;

/// Plugin name and factory id.
pub const NAME: &str = "level_stats";

/// Point-in-time counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    /// Records seen per level.
    pub by_level: BTreeMap<LogLevel, u64>,
    /// Records seen in total.
    pub total: u64,
}

impl LevelCounts {
    /// Count for one level.
    pub fn get(&self, level: LogLevel) -> u64 {
        self.by_level.get(&level).copied().unwrap_or(0)
    }
}

/// Per-level record counter.
#[derive(Debug)]
pub struct LevelStats {
    descriptor: PluginDescriptor,
    counts: Mutex<LevelCounts>,
}

impl LevelStats {
    /// Creates a counter with everything at zero.
    pub fn new() -> Self {
        Self {
            descriptor: plugin_descriptor!(
                name: NAME,
                plugin_type: PluginType::Analysis,
                version: "1.0.0",
                author: "Logloom Team",
                description: "Counts records per level"
            ),
            counts: Mutex::new(LevelCounts::default()),
        }
    }

    /// Current counts.
    pub fn snapshot(&self) -> LevelCounts {
        self.counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }
}

impl Default for LevelStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPlugin for LevelStats {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, _helpers: &PluginHelpers) -> Result<(), PluginError> {
        Ok(())
    }

    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError> {
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| PluginError::process(NAME, "counter lock poisoned"))?;
        *counts.by_level.entry(record.level).or_insert(0) += 1;
        counts.total += 1;
        Ok(ProcessResult::Ok)
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        let counts = self.snapshot();
        tracing::info!(plugin = NAME, total = counts.total, "Level stats final counts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_level() {
        let stats = LevelStats::new();
        for level in [LogLevel::Info, LogLevel::Info, LogLevel::Error] {
            stats.process(&LogRecord::new(level, "x")).unwrap();
        }

        let counts = stats.snapshot();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.get(LogLevel::Info), 2);
        assert_eq!(counts.get(LogLevel::Error), 1);
        assert_eq!(counts.get(LogLevel::Debug), 0);

        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["by_level"]["info"], 2);
    }
}
