//! `tracing` subscriber setup for the binaries.

use std::io;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The fallback level is not a valid filter directive.
    #[error("invalid log level '{level}': {message}")]
    InvalidLevel {
        /// Rejected directive.
        level: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Builds the filter: `RUST_LOG` when set, otherwise `default_level`.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidLevel`] when `default_level` does not
/// parse and `RUST_LOG` is unset.
pub fn filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|err| LoggingError::InvalidLevel {
        level: default_level.to_owned(),
        message: err.to_string(),
    })
}

/// Installs a stderr formatter so stdout carries only status lines.
///
/// # Errors
///
/// Returns [`LoggingError`] when the level is invalid or a subscriber is
/// already installed.
pub fn init(default_level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level)?)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}
