//! Convenience macros for plugin authors.

/// Builds a [`PluginDescriptor`](crate::contract::PluginDescriptor).
///
/// # Example
/// ```rust,ignore
/// let descriptor = plugin_descriptor!(
///     name: "level_filter",
///     plugin_type: PluginType::Filter,
///     version: "1.0.0",
///     author: "ops",
///     description: "Drops records below a level"
/// );
/// ```
#[macro_export]
macro_rules! plugin_descriptor {
    (
        name: $name:expr,
        plugin_type: $plugin_type:expr
        $(, version: $version:expr)?
        $(, author: $author:expr)?
        $(, description: $desc:expr)?
        $(, capabilities: $caps:expr)?
        $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut descriptor = $crate::contract::PluginDescriptor::new($name, $plugin_type);
        $( descriptor.version = $version.to_string(); )?
        $( descriptor.author = $author.to_string(); )?
        $( descriptor.description = $desc.to_string(); )?
        $( descriptor.capabilities = $caps; )?
        descriptor
    }};
}

/// Builds a [`LogRecord`](logloom_core::LogRecord) stamped with the call
/// site's module, file and line.
///
/// # Example
/// ```rust,ignore
/// let record = log_record!(LogLevel::Warn, "disk low", {
///     "free_mb" => json!(12),
/// });
/// ```
#[macro_export]
macro_rules! log_record {
    ($level:expr, $message:expr) => {
        $crate::prelude::LogRecord::new($level, $message)
            .with_module(module_path!())
            .with_location(file!(), line!())
    };
    ($level:expr, $message:expr, { $($key:expr => $value:expr),* $(,)? }) => {{
        let mut record = $crate::log_record!($level, $message);
        $(
            record.context.insert($key.to_string(), $value);
        )*
        record
    }};
}
