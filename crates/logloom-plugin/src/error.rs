//! Plugin engine errors.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use logloom_core::error::{AppError, ErrorKind};

/// Errors raised while discovering, loading, or running plugins.
///
/// None of these abort the engine on their own; callers decide whether a
/// failure skips a candidate, disables an instance, or is only logged.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// A search path could not be listed.
    #[error("cannot scan '{path}': {message}")]
    Discovery {
        /// Path that failed.
        path: PathBuf,
        /// Underlying reason.
        message: String,
    },

    /// A candidate could not be turned into plugins.
    #[error("failed to load '{path}': {message}")]
    Load {
        /// Candidate location.
        path: PathBuf,
        /// Underlying reason.
        message: String,
    },

    /// A plugin's init hook reported failure.
    #[error("plugin '{plugin}' failed to initialize: {message}")]
    Init {
        /// Plugin name.
        plugin: String,
        /// Underlying reason.
        message: String,
    },

    /// Another plugin already owns the name.
    #[error("plugin name '{0}' is already registered")]
    DuplicateName(String),

    /// A plugin faulted while handling a record.
    #[error("plugin '{plugin}' failed to process record: {message}")]
    Process {
        /// Plugin name.
        plugin: String,
        /// Underlying reason.
        message: String,
    },

    /// A plugin's shutdown hook reported failure.
    #[error("plugin '{plugin}' failed to shut down: {message}")]
    Shutdown {
        /// Plugin name.
        plugin: String,
        /// Underlying reason.
        message: String,
    },

    /// The manager was used before `initialize`.
    #[error("plugin system is not initialized")]
    NotInitialized,
}

impl PluginError {
    /// Shorthand for a load failure.
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an init failure.
    pub fn init(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Init {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a processing fault.
    pub fn process(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a shutdown failure.
    pub fn shutdown(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Shutdown {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = match &err {
            PluginError::NotInitialized => ErrorKind::NotInitialized,
            PluginError::DuplicateName(_) => ErrorKind::Conflict,
            _ => ErrorKind::Plugin,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

/// Runs plugin code, turning a panic into an error built by `on_panic`.
pub(crate) fn guarded<T>(
    call: impl FnOnce() -> Result<T, PluginError>,
    on_panic: impl FnOnce(String) -> PluginError,
) -> Result<T, PluginError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(on_panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
