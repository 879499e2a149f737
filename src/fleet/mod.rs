//! Fleet configuration: which servers to image and how.
//!
//! The file is TOML with a `[DEFAULT]` table of fallback values and one table
//! per server overriding any of them except `ConcurrentWorkers`:
//!
//! ```toml
//! [DEFAULT]
//! ConcurrentWorkers = 4
//! SaveTimeoutMinutes = 120
//! RetainImageMinutes = 1440
//! Region = "DFW"
//!
//! ["web1.example.com"]
//! Enabled = true
//! ```

pub mod auth;
mod source;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub use auth::{AuthConfig, AuthConfigError};
pub(crate) use source::read_file;

const DEFAULT_SECTION: &str = "DEFAULT";
const SECONDS_PER_MINUTE: u64 = 60;

/// Errors raised while loading or validating the fleet configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum FleetConfigError {
    /// The configuration file could not be read.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse fleet configuration: {0}")]
    Parse(String),
    /// `[DEFAULT]` does not set `ConcurrentWorkers`.
    #[error("Config must contain ConcurrentWorkers")]
    MissingConcurrentWorkers,
    /// `ConcurrentWorkers` is zero or negative.
    #[error("Concurrent workers must be greater than 0")]
    InvalidConcurrentWorkers,
    /// No server sections were found.
    #[error("You must configure at least one server")]
    NoServers,
    /// A server was requested by name but has no section.
    #[error("The specified server is not configured: {0}")]
    UnknownServer(String),
    /// A server section, merged with `[DEFAULT]`, lacks a required key.
    #[error("Server Config for {server} is missing {key}")]
    MissingServerKey {
        /// Server section name.
        server: String,
        /// Missing key.
        key: &'static str,
    },
}

/// Immutable configuration of one server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    /// Server name as known to the provider.
    pub name: String,
    /// Provider region.
    pub region: String,
    /// Whether the scheduler should process this server.
    pub enabled: bool,
    /// How long to wait for a new image to finish saving.
    pub save_timeout: Duration,
    /// How long active images are kept.
    pub retain_window: Duration,
}

impl ServerConfig {
    /// Creates an enabled server configuration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        save_timeout: Duration,
        retain_window: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            enabled: true,
            save_timeout,
            retain_window,
        }
    }

    /// Overrides the enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Validated fleet configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FleetConfig {
    /// Process-wide cap on concurrently running lifecycles.
    pub concurrent_workers: NonZeroUsize,
    /// Every configured server, in section-name order.
    pub servers: Vec<ServerConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSection {
    concurrent_workers: Option<i64>,
    save_timeout_minutes: Option<u64>,
    retain_image_minutes: Option<u64>,
    region: Option<String>,
    enabled: Option<bool>,
}

impl RawSection {
    fn region(&self) -> Option<&str> {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
    }
}

impl FleetConfig {
    /// Reads and validates the configuration file at `path`.
    ///
    /// When `selected` names a server, the fleet is narrowed to that server
    /// and it is enabled regardless of its `Enabled` flag.
    ///
    /// # Errors
    ///
    /// Returns [`FleetConfigError::Io`] when the file cannot be read, or any
    /// validation error raised by [`FleetConfig::parse`].
    pub fn load(path: &Utf8Path, selected: Option<&str>) -> Result<Self, FleetConfigError> {
        let contents = read_file(path).map_err(|err| FleetConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let config = Self::parse(&contents, selected)?;
        debug!(
            %path,
            servers = config.servers.len(),
            workers = config.concurrent_workers.get(),
            "loaded fleet configuration"
        );
        Ok(config)
    }

    /// Parses and validates configuration text, optionally narrowing the
    /// fleet to the `selected` server.
    ///
    /// # Errors
    ///
    /// Returns a [`FleetConfigError`] describing the first problem found.
    /// A selected server without a section is reported as
    /// [`FleetConfigError::UnknownServer`] even when no servers exist.
    pub fn parse(contents: &str, selected: Option<&str>) -> Result<Self, FleetConfigError> {
        let mut sections: BTreeMap<String, RawSection> =
            toml::from_str(contents).map_err(|err| FleetConfigError::Parse(err.to_string()))?;
        let defaults = sections.remove(DEFAULT_SECTION).unwrap_or_default();

        let workers = defaults
            .concurrent_workers
            .ok_or(FleetConfigError::MissingConcurrentWorkers)?;
        let concurrent_workers = usize::try_from(workers)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(FleetConfigError::InvalidConcurrentWorkers)?;

        if let Some(name) = selected {
            let section = sections
                .remove(name)
                .ok_or_else(|| FleetConfigError::UnknownServer(name.to_owned()))?;
            let mut server = merge_server(name.to_owned(), &section, &defaults)?;
            server.enabled = true;
            return Ok(Self {
                concurrent_workers,
                servers: vec![server],
            });
        }

        if sections.is_empty() {
            return Err(FleetConfigError::NoServers);
        }

        let servers = sections
            .into_iter()
            .map(|(name, section)| merge_server(name, &section, &defaults))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            concurrent_workers,
            servers,
        })
    }
}

fn merge_server(
    name: String,
    section: &RawSection,
    defaults: &RawSection,
) -> Result<ServerConfig, FleetConfigError> {
    let missing = |key: &'static str| FleetConfigError::MissingServerKey {
        server: name.clone(),
        key,
    };

    let save_minutes = section
        .save_timeout_minutes
        .or(defaults.save_timeout_minutes)
        .ok_or_else(|| missing("SaveTimeoutMinutes"))?;
    let retain_minutes = section
        .retain_image_minutes
        .or(defaults.retain_image_minutes)
        .ok_or_else(|| missing("RetainImageMinutes"))?;
    let region = section
        .region()
        .or_else(|| defaults.region())
        .ok_or_else(|| missing("Region"))?
        .to_owned();
    let enabled = section.enabled.or(defaults.enabled).unwrap_or(false);

    Ok(ServerConfig {
        name,
        region,
        enabled,
        save_timeout: minutes(save_minutes),
        retain_window: minutes(retain_minutes),
    })
}

const fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(SECONDS_PER_MINUTE))
}

#[cfg(test)]
mod tests;
