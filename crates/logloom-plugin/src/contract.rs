//! The contract every plugin implements, and the metadata it declares.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use logloom_core::LogRecord;

use crate::error::PluginError;
use crate::helpers::PluginHelpers;

/// Which stage of the pipeline a plugin participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Accepts or rejects records before they reach sinks.
    Filter,
    /// Writes accepted records somewhere.
    Sink,
    /// Observes accepted records.
    Analysis,
    /// Serves text resources. Loaded and listed, never dispatched.
    TextResource,
    /// Declared type was not recognized.
    Unknown,
}

impl PluginType {
    /// Maps the C ABI type code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Filter,
            1 => Self::Sink,
            2 => Self::Analysis,
            3 => Self::TextResource,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Filter => "filter",
            Self::Sink => "sink",
            Self::Analysis => "analysis",
            Self::TextResource => "text_resource",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Execution mode. Only synchronous plugins exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginMode {
    /// `process` runs on the caller's thread and returns before dispatch
    /// moves on.
    #[default]
    Synchronous,
}

/// Advisory capability flags. The engine records them but does not act on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginCapabilities(u32);

impl PluginCapabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Can handle records in batches.
    pub const BATCH: Self = Self(1);
    /// Consumes the structured context payload.
    pub const STRUCTURED_PAYLOAD: Self = Self(1 << 1);
    /// Streams output rather than buffering it.
    pub const STREAMING: Self = Self(1 << 2);

    const ALL: u32 = 0b111;

    /// Builds flags from raw bits, dropping unknown ones.
    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PluginCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Static metadata a plugin declares about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique name. Empty means "use the unit's file stem".
    pub name: String,
    /// Version string.
    pub version: String,
    /// Author or maintainer.
    pub author: String,
    /// Pipeline stage.
    pub plugin_type: PluginType,
    /// Execution mode.
    #[serde(default)]
    pub mode: PluginMode,
    /// Advisory capabilities.
    #[serde(default)]
    pub capabilities: PluginCapabilities,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl PluginDescriptor {
    /// Creates a descriptor with version `0.1.0` and no author.
    pub fn new(name: impl Into<String>, plugin_type: PluginType) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            author: String::new(),
            plugin_type,
            mode: PluginMode::Synchronous,
            capabilities: PluginCapabilities::NONE,
            description: String::new(),
        }
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the capability flags.
    pub fn with_capabilities(mut self, capabilities: PluginCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Outcome of processing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessResult {
    /// Handled. For filters: let the record through.
    Ok,
    /// The plugin could not handle the record.
    Error,
    /// The plugin chose not to handle the record. For filters: drop it.
    Skip,
    /// The plugin asks for the record again later.
    Retry,
}

impl ProcessResult {
    /// Maps the C ABI result code (`0..=3`).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Skip),
            3 => Some(Self::Retry),
            _ => None,
        }
    }
}

/// Trait that all plugins must implement.
///
/// A plugin is shared between the registry and in-flight dispatch calls,
/// so every method takes `&self`; plugins keep mutable state behind their
/// own locks. A panic in any method is caught by the engine and treated
/// like an `Err`.
pub trait LogPlugin: Send + Sync + fmt::Debug {
    /// Returns the plugin's metadata.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Called once after loading, before the plugin sees any record.
    ///
    /// An error leaves the plugin registered but disabled.
    fn init(&self, helpers: &PluginHelpers) -> Result<(), PluginError>;

    /// Handles one record. An error is a fault, not a verdict.
    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError>;

    /// Called once when the plugin is unloaded, if it is still enabled.
    fn shutdown(&self) -> Result<(), PluginError>;

    /// Receives the registry's enabled flag whenever it changes.
    fn set_enabled(&self, _enabled: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_combine() {
        let caps = PluginCapabilities::BATCH | PluginCapabilities::STREAMING;
        assert!(caps.contains(PluginCapabilities::BATCH));
        assert!(!caps.contains(PluginCapabilities::STRUCTURED_PAYLOAD));
        assert_eq!(caps.bits(), 0b101);
        assert_eq!(PluginCapabilities::from_bits_truncate(0xff).bits(), 0b111);
        assert!(PluginCapabilities::NONE.is_empty());
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(ProcessResult::from_code(0), Some(ProcessResult::Ok));
        assert_eq!(ProcessResult::from_code(2), Some(ProcessResult::Skip));
        assert_eq!(ProcessResult::from_code(-1), None);
    }

    #[test]
    fn test_type_codes_fall_back_to_unknown() {
        assert_eq!(PluginType::from_code(1), PluginType::Sink);
        assert_eq!(PluginType::from_code(42), PluginType::Unknown);
        assert_eq!(PluginType::TextResource.to_string(), "text_resource");
    }

    #[test]
    fn test_asynchronous_mode_is_rejected() {
        let mode: Result<PluginMode, _> = serde_json::from_str("\"asynchronous\"");
        assert!(mode.is_err());
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = PluginDescriptor::new("json_sink", PluginType::Sink)
            .with_version("1.2.0")
            .with_author("ops")
            .with_capabilities(PluginCapabilities::STRUCTURED_PAYLOAD);
        assert_eq!(desc.version, "1.2.0");
        assert_eq!(desc.mode, PluginMode::Synchronous);
        assert!(desc.capabilities.contains(PluginCapabilities::STRUCTURED_PAYLOAD));
    }
}
