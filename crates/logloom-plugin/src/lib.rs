//! # logloom-plugin
//!
//! Plugin engine for Logloom. Provides:
//!
//! - The plugin contract (`LogPlugin`) and its metadata types
//! - Discovery of plugin libraries and packages across search paths
//! - Loading with manifest-driven enablement, ordering and settings
//! - A lock-guarded registry of loaded instances
//! - Record dispatch to filters, sinks and analysis plugins with fault
//!   isolation
//! - Optional shared-library plugins over a C ABI (`dynamic` feature)

pub mod catalog;
pub mod contract;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod exports;
pub mod ffi;
pub mod helpers;
pub mod loader;
mod macros;
pub mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ordering;
pub mod prelude;
pub mod registry;

pub use catalog::PluginCatalog;
pub use contract::{LogPlugin, PluginDescriptor, PluginType, ProcessResult};
pub use dispatcher::{Dispatcher, FilterVerdict};
pub use error::PluginError;
pub use helpers::PluginHelpers;
pub use manager::PluginManager;
pub use registry::{PluginInstance, PluginRegistry};
