//! Log record handed to every plugin in the pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record severity. Smaller values are more verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug = 0,
    /// Normal operation.
    Info = 1,
    /// Something unexpected but recoverable.
    Warn = 2,
    /// An operation failed.
    Error = 3,
    /// The process cannot continue.
    Fatal = 4,
}

impl LogLevel {
    /// Numeric severity, as compared against plugin thresholds.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    /// Maps a numeric severity back to a level.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Debug),
            1 => Some(Self::Info),
            2 => Some(Self::Warn),
            3 => Some(Self::Error),
            4 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Upper-case label, as written by sinks.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An already-constructed log record.
///
/// Plugins only ever see `&LogRecord`; the pipeline never hands out a
/// mutable reference, so one plugin cannot alter what the next one sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Rendered message text.
    pub message: String,
    /// Emitting module.
    pub module: String,
    /// Source file of the emitting call site.
    pub source_file: String,
    /// Source line of the emitting call site.
    pub source_line: u32,
    /// Structured context, keyed by string.
    pub context: HashMap<String, Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            module: String::new(),
            source_file: String::new(),
            source_line: 0,
            context: HashMap::new(),
        }
    }

    /// Sets the emitting module.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Sets the call site.
    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source_file = file.into();
        self.source_line = line;
        self
    }

    /// Overrides the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Inserts a context value.
    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Gets a context value by key.
    pub fn get_context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// Gets a string context value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered_by_verbosity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert_eq!(LogLevel::Warn.as_i64(), 2);
        assert_eq!(LogLevel::from_i64(3), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_i64(9), None);
    }

    #[test]
    fn test_builder_fills_fields() {
        let record = LogRecord::new(LogLevel::Info, "started")
            .with_module("server")
            .with_location("main.rs", 42)
            .with_context("port", serde_json::json!(8080))
            .with_context("host", serde_json::json!("localhost"));

        assert_eq!(record.module, "server");
        assert_eq!(record.source_file, "main.rs");
        assert_eq!(record.source_line, 42);
        assert_eq!(record.get_context("port"), Some(&serde_json::json!(8080)));
        assert_eq!(record.get_string("host"), Some("localhost"));
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&LogLevel::Warn).expect("serialize");
        assert_eq!(json, "\"warn\"");
    }
}
