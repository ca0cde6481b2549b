//! Record dispatcher: runs filters, sinks and analysis plugins in rank
//! order.
//!
//! For filters:
//! - Plugins are called in rank order.
//! - Any result other than `Ok` rejects the record and stops the chain.
//! - A fault is logged and resolved by the [`FilterErrorPolicy`].
//!
//! For sinks and analysis plugins:
//! - Every enabled plugin is called, whatever earlier ones returned.
//! - Faults are logged and otherwise ignored.
//!
//! Plugin panics are caught and treated as faults. Nothing a plugin does
//! escapes these calls.

use std::sync::Arc;

use tracing::{debug, error};

use logloom_core::LogRecord;
use logloom_core::config::FilterErrorPolicy;

use crate::contract::{PluginType, ProcessResult};
use crate::error::{PluginError, guarded};
use crate::registry::{PluginInstance, PluginRegistry};

/// Detailed outcome of a filter pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    /// Whether the record may continue to sinks.
    pub accepted: bool,
    /// Filter that rejected the record, if any.
    pub rejected_by: Option<String>,
    /// What the rejecting filter returned; `None` when it faulted.
    pub result: Option<ProcessResult>,
    /// Filters that faulted during the pass.
    pub faults: usize,
}

impl FilterVerdict {
    fn accepted(faults: usize) -> Self {
        Self {
            accepted: true,
            rejected_by: None,
            result: None,
            faults,
        }
    }

    fn rejected(plugin: &str, result: Option<ProcessResult>, faults: usize) -> Self {
        Self {
            accepted: false,
            rejected_by: Some(plugin.to_string()),
            result,
            faults,
        }
    }
}

/// Dispatches records to registered plugins.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    filter_error_policy: FilterErrorPolicy,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: Arc<PluginRegistry>, filter_error_policy: FilterErrorPolicy) -> Self {
        Self {
            registry,
            filter_error_policy,
        }
    }

    /// How faulting filters are treated.
    pub fn filter_error_policy(&self) -> FilterErrorPolicy {
        self.filter_error_policy
    }

    /// Runs the filter chain and reports who, if anyone, rejected the
    /// record.
    pub fn evaluate_filters(&self, record: &LogRecord) -> FilterVerdict {
        let filters = self.registry.enabled_of_type(PluginType::Filter);
        let mut faults = 0;

        for filter in &filters {
            match invoke(filter, record) {
                Ok(ProcessResult::Ok) => {}
                Ok(result) => {
                    debug!(plugin = %filter.name(), ?result, "Filter rejected record");
                    return FilterVerdict::rejected(filter.name(), Some(result), faults);
                }
                Err(e) => {
                    faults += 1;
                    error!(
                        plugin = %filter.name(),
                        error = %e,
                        policy = ?self.filter_error_policy,
                        "Filter plugin faulted"
                    );
                    if self.filter_error_policy == FilterErrorPolicy::FailClosed {
                        return FilterVerdict::rejected(filter.name(), None, faults);
                    }
                }
            }
        }

        FilterVerdict::accepted(faults)
    }

    /// Whether every enabled filter accepts the record.
    pub fn run_filters(&self, record: &LogRecord) -> bool {
        self.evaluate_filters(record).accepted
    }

    /// Hands the record to every enabled sink.
    pub fn run_sinks(&self, record: &LogRecord) {
        self.run_all(PluginType::Sink, record);
    }

    /// Hands the record to every enabled analysis plugin.
    pub fn run_analysis(&self, record: &LogRecord) {
        self.run_all(PluginType::Analysis, record);
    }

    /// Full pipeline: filters, then sinks and analysis for accepted
    /// records. Returns whether the record was accepted.
    pub fn dispatch(&self, record: &LogRecord) -> bool {
        if !self.run_filters(record) {
            return false;
        }
        self.run_sinks(record);
        self.run_analysis(record);
        true
    }

    fn run_all(&self, plugin_type: PluginType, record: &LogRecord) {
        let plugins = self.registry.enabled_of_type(plugin_type);
        if plugins.is_empty() {
            return;
        }

        debug!(plugin_type = %plugin_type, count = plugins.len(), "Dispatching record");

        for plugin in &plugins {
            match invoke(plugin, record) {
                Ok(ProcessResult::Ok) => {}
                Ok(result) => {
                    debug!(plugin = %plugin.name(), ?result, "Plugin did not handle record");
                }
                Err(e) => {
                    error!(
                        plugin = %plugin.name(),
                        error = %e,
                        "Plugin faulted while processing record"
                    );
                }
            }
        }
    }
}

fn invoke(instance: &PluginInstance, record: &LogRecord) -> Result<ProcessResult, PluginError> {
    guarded(
        || instance.plugin.process(record),
        |message| PluginError::process(instance.name(), message),
    )
}
