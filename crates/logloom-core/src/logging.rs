//! Tracing subscriber setup for the host application.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::AppError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Returns an error if a
/// global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            AppError::configuration(format!("invalid log level '{}': {e}", config.level))
        })?;

    let installed = match config.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init(),
        _ => fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    installed.map_err(|e| AppError::internal(format!("tracing already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        };
        // The first call may lose the race with another test's subscriber;
        // the second call can never succeed.
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
