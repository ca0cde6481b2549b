//! Prelude for plugin authors.

pub use logloom_core::{LogLevel, LogRecord};

pub use crate::contract::{
    LogPlugin, PluginCapabilities, PluginDescriptor, PluginMode, PluginType, ProcessResult,
};
pub use crate::error::PluginError;
pub use crate::exports::PluginExport;
pub use crate::helpers::{PluginHelpers, ScopedConfig};

pub use crate::catalog::PluginCatalog;

pub use crate::{log_record, plugin_descriptor};
