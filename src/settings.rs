//! Process settings loaded via `ortho-config`.
//!
//! Values merge defaults, `imageroller.toml`, and `IMAGEROLLER_*`
//! environment variables; command-line flags are applied on top with
//! [`Settings::with_overrides`].

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Settings shared by the orchestrator binary.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "IMAGEROLLER",
    discovery(
        app_name = "imageroller",
        env_var = "IMAGEROLLER_SETTINGS_PATH",
        config_file_name = "imageroller.toml",
        dotfile_name = ".imageroller.toml",
        project_file_name = "imageroller.toml"
    )
)]
pub struct Settings {
    /// Path of the fleet configuration file.
    #[ortho_config(default = "/etc/imageroller/config.toml".to_owned())]
    pub fleet_config: String,
    /// Path of the credentials file.
    #[ortho_config(default = "/etc/imageroller/auth.toml".to_owned())]
    pub auth_config: String,
    /// Identity service token endpoint.
    #[ortho_config(default = "https://identity.api.rackspacecloud.com/v2.0/tokens".to_owned())]
    pub identity_url: String,
    /// Seconds between image status polls.
    #[ortho_config(default = 30)]
    pub poll_interval_secs: u64,
    /// Per-request HTTP timeout in seconds.
    #[ortho_config(default = 30)]
    pub http_timeout_secs: u64,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[ortho_config(default = "info".to_owned())]
    pub log_level: String,
}

/// Metadata for a settings field, used to build actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> SettingsError {
        SettingsError::MissingField(format!(
            "missing {}: set {} or add {} to imageroller.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const FLEET_CONFIG: FieldMetadata = FieldMetadata::new(
    "fleet configuration path",
    "IMAGEROLLER_FLEET_CONFIG",
    "fleet_config",
);
const AUTH_CONFIG: FieldMetadata = FieldMetadata::new(
    "auth configuration path",
    "IMAGEROLLER_AUTH_CONFIG",
    "auth_config",
);
const IDENTITY_URL: FieldMetadata = FieldMetadata::new(
    "identity endpoint",
    "IMAGEROLLER_IDENTITY_URL",
    "identity_url",
);
const POLL_INTERVAL: FieldMetadata = FieldMetadata::new(
    "non-zero poll interval",
    "IMAGEROLLER_POLL_INTERVAL_SECS",
    "poll_interval_secs",
);
const HTTP_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "non-zero HTTP timeout",
    "IMAGEROLLER_HTTP_TIMEOUT_SECS",
    "http_timeout_secs",
);

impl Settings {
    /// Loads settings without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from("imageroller")])
            .map_err(|err| SettingsError::Parse(err.to_string()))
    }

    /// Applies command-line overrides; `None` keeps the loaded value.
    #[must_use]
    pub fn with_overrides(
        mut self,
        fleet_config: Option<String>,
        auth_config: Option<String>,
        log_level: Option<String>,
    ) -> Self {
        if let Some(path) = fleet_config {
            self.fleet_config = path;
        }
        if let Some(path) = auth_config {
            self.auth_config = path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }

    /// Checks that required values are present and non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingField`] naming the environment
    /// variable and TOML key that supply the offending value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        require_text(&self.fleet_config, &FLEET_CONFIG)?;
        require_text(&self.auth_config, &AUTH_CONFIG)?;
        require_text(&self.identity_url, &IDENTITY_URL)?;
        if self.poll_interval_secs == 0 {
            return Err(POLL_INTERVAL.missing());
        }
        if self.http_timeout_secs == 0 {
            return Err(HTTP_TIMEOUT.missing());
        }
        Ok(())
    }

    /// Fleet configuration path.
    #[must_use]
    pub fn fleet_config_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.fleet_config)
    }

    /// Credentials file path.
    #[must_use]
    pub fn auth_config_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.auth_config)
    }

    /// Interval between status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn require_text(value: &str, metadata: &FieldMetadata) -> Result<(), SettingsError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

/// Errors raised while loading or validating settings.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// A required value is empty or zero.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for SettingsError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
