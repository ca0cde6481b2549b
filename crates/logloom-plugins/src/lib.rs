//! # logloom-plugins
//!
//! Builtin plugins compiled into the host. A package directory selects one
//! by naming its factory in `plugin.toml`:
//!
//! ```toml
//! [plugin]
//! factory = "json_sink"
//! ```

pub mod json_sink;
pub mod keyword_filter;
pub mod level_filter;
pub mod level_stats;

use logloom_plugin::{PluginCatalog, exports::PluginExport};

pub use json_sink::JsonSink;
pub use keyword_filter::KeywordFilter;
pub use level_filter::LevelFilter;
pub use level_stats::{LevelCounts, LevelStats};

/// Adds every builtin factory to `catalog`, keyed by plugin name.
pub fn register_builtins(catalog: &mut PluginCatalog) {
    catalog.register(level_filter::NAME, || PluginExport::single(LevelFilter::new()));
    catalog.register(keyword_filter::NAME, || {
        PluginExport::single(KeywordFilter::new())
    });
    catalog.register(json_sink::NAME, || PluginExport::single(JsonSink::new()));
    catalog.register(level_stats::NAME, || PluginExport::single(LevelStats::new()));
}

/// A catalog holding only the builtins.
pub fn builtin_catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    register_builtins(&mut catalog);
    catalog
}
