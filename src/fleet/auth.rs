//! API credentials file.
//!
//! Credentials live apart from the fleet file so they can carry tighter file
//! permissions:
//!
//! ```toml
//! [AUTH]
//! ApiUser = "ops"
//! ApiKey = "0123456789abcdef"
//! ```

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;

use super::read_file;
use crate::provider::Credentials;

const AUTH_SECTION: &str = "AUTH";

/// Errors raised while loading the credentials file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AuthConfigError {
    /// The file could not be read.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse auth configuration: {0}")]
    Parse(String),
    /// No `[AUTH]` table.
    #[error("AuthConfig must contain [AUTH]")]
    MissingSection,
    /// `[AUTH]` lacks a key or leaves it blank.
    #[error("AuthConfig must contain {0}")]
    MissingKey(&'static str),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAuth {
    api_user: Option<String>,
    api_key: Option<String>,
}

/// Credentials read from the auth file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthConfig {
    credentials: Credentials,
}

impl AuthConfig {
    /// Reads the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError::Io`] when the file cannot be read, or the
    /// errors of [`AuthConfig::parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, AuthConfigError> {
        let contents = read_file(path).map_err(|err| AuthConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(&contents)
    }

    /// Parses credentials text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError::MissingSection`] or
    /// [`AuthConfigError::MissingKey`] when a value is absent or blank.
    pub fn parse(contents: &str) -> Result<Self, AuthConfigError> {
        let mut sections: BTreeMap<String, toml::Value> =
            toml::from_str(contents).map_err(|err| AuthConfigError::Parse(err.to_string()))?;
        let section = sections
            .remove(AUTH_SECTION)
            .ok_or(AuthConfigError::MissingSection)?;
        let raw: RawAuth = section
            .try_into()
            .map_err(|err: toml::de::Error| AuthConfigError::Parse(err.to_string()))?;

        let username = required(raw.api_user, "ApiUser")?;
        let api_key = required(raw.api_key, "ApiKey")?;
        Ok(Self {
            credentials: Credentials::new(username, api_key),
        })
    }

    /// Credentials for the identity exchange.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, AuthConfigError> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or(AuthConfigError::MissingKey(key))
}
