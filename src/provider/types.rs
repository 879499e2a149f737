//! Values exchanged between the lifecycle and the provider.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::ProviderError;

/// API credentials used for the identity exchange.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Account user name.
    pub username: String,
    /// API key paired with the user name.
    pub api_key: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Result of the identity exchange: the run-wide token and the service
/// endpoints it grants, keyed by upper-case region name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Identity {
    token: String,
    compute: BTreeMap<String, String>,
    images: BTreeMap<String, String>,
}

impl Identity {
    /// Creates an identity with no endpoints.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Registers the compute (servers) endpoint for a region.
    #[must_use]
    pub fn with_compute_endpoint(mut self, region: &str, url: impl Into<String>) -> Self {
        self.compute.insert(normalise_region(region), url.into());
        self
    }

    /// Registers the images endpoint for a region.
    #[must_use]
    pub fn with_image_endpoint(mut self, region: &str, url: impl Into<String>) -> Self {
        self.images.insert(normalise_region(region), url.into());
        self
    }

    /// Returns the authentication token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the compute endpoint for `region`, if the catalog has one.
    #[must_use]
    pub fn compute_endpoint(&self, region: &str) -> Option<&str> {
        self.compute.get(&normalise_region(region)).map(String::as_str)
    }

    /// Returns the images endpoint for `region`, if the catalog has one.
    #[must_use]
    pub fn image_endpoint(&self, region: &str) -> Option<&str> {
        self.images.get(&normalise_region(region)).map(String::as_str)
    }
}

fn normalise_region(region: &str) -> String {
    region.trim().to_ascii_uppercase()
}

/// One provider-side image snapshot of a server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageRecord {
    /// Provider image identifier.
    pub id: String,
    /// Image name.
    pub name: String,
    /// `true` once the image has finished saving.
    pub active: bool,
    /// Last modification time reported by the provider.
    pub updated_at: DateTime<Utc>,
}

/// Region-scoped context used before the server id is known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionSession {
    /// Region the session targets.
    pub region: String,
    /// Token copied from the run-wide [`Identity`].
    pub token: String,
    /// Base URL of the compute (servers) API.
    pub servers_url: String,
    /// Base URL of the images API.
    pub images_url: String,
}

impl RegionSession {
    /// Builds a session for `region` from the run's identity.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingEndpoint`] when the service catalog
    /// lacks a compute or images endpoint for the region.
    pub fn open(identity: &Identity, region: &str) -> Result<Self, ProviderError> {
        let servers_url =
            identity
                .compute_endpoint(region)
                .ok_or_else(|| ProviderError::MissingEndpoint {
                    service: String::from("compute"),
                    region: region.to_owned(),
                })?;
        let images_url =
            identity
                .image_endpoint(region)
                .ok_or_else(|| ProviderError::MissingEndpoint {
                    service: String::from("image"),
                    region: region.to_owned(),
                })?;

        Ok(Self {
            region: region.to_owned(),
            token: identity.token().to_owned(),
            servers_url: servers_url.trim_end_matches('/').to_owned(),
            images_url: images_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Binds the session to a resolved server.
    #[must_use]
    pub fn into_server_session(self, server_id: impl Into<String>) -> ServerSession {
        ServerSession {
            server_id: server_id.into(),
            region: self,
        }
    }
}

/// Per-server context owned by a single lifecycle for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSession {
    /// Provider server identifier.
    pub server_id: String,
    region: RegionSession,
}

impl ServerSession {
    /// Returns the authentication token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.region.token
    }

    /// Returns the compute API base URL.
    #[must_use]
    pub fn servers_url(&self) -> &str {
        &self.region.servers_url
    }

    /// Returns the images API base URL.
    #[must_use]
    pub fn images_url(&self) -> &str {
        &self.region.images_url
    }

    /// Returns the region the server lives in.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn identity() -> Identity {
        Identity::new("token-1")
            .with_compute_endpoint("DFW", "https://dfw.servers.example/v2/123/")
            .with_image_endpoint("dfw", "https://dfw.images.example/v2")
            .with_compute_endpoint("IAD", "https://iad.servers.example/v2/123")
    }

    #[rstest]
    fn region_session_copies_token_and_trims_urls() {
        let session = RegionSession::open(&identity(), "dfw").expect("DFW is in the catalog");
        assert_eq!(session.token, "token-1");
        assert_eq!(session.servers_url, "https://dfw.servers.example/v2/123");
        assert_eq!(session.images_url, "https://dfw.images.example/v2");

        let server = session.into_server_session("srv-1");
        assert_eq!(server.server_id, "srv-1");
        assert_eq!(server.token(), "token-1");
        assert_eq!(server.region(), "dfw");
    }

    #[rstest]
    #[case("IAD", "image")]
    #[case("ORD", "compute")]
    fn region_session_requires_both_endpoints(#[case] region: &str, #[case] service: &str) {
        let err = RegionSession::open(&identity(), region).expect_err("endpoint is missing");
        assert_eq!(
            err,
            ProviderError::MissingEndpoint {
                service: service.to_owned(),
                region: region.to_owned(),
            }
        );
    }

    #[rstest]
    fn credentials_debug_redacts_api_key() {
        let rendered = format!("{:?}", Credentials::new("ops", "s3cr3t"));
        assert!(rendered.contains("ops"));
        assert!(!rendered.contains("s3cr3t"), "api key leaked: {rendered}");
    }
}
