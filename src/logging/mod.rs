//! Structured logging setup
//!
//! Initializes the global `tracing` subscriber from `LoggingConfig`:
//! an `EnvFilter` built from the configured level (`RUST_LOG` wins when
//! set) and either a human-readable or JSON formatting layer.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Logging error types
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Initialization error: {0}")]
    InitError(String),
}

/// Initialize the global tracing subscriber from configuration.
///
/// Must be called at most once per process; a second call returns an
/// `InitError` instead of panicking.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_error_not_panic() {
        let config = LoggingConfig::default();
        // Whichever call loses the race, neither may panic.
        let first = init(&config);
        let second = init(&config);
        assert!(first.is_ok() || second.is_err());
    }
}
