//! Rackspace Cloud implementation of [`Provider`].
//!
//! Talks to the v2 identity service, the `cloudServersOpenStack` compute API,
//! and the `cloudImages` API with plain `reqwest` calls. Every request
//! carries the run-wide token in `X-Auth-Token`.

mod identity;
mod images;
mod servers;

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};

use super::{
    Credentials, Identity, ImageRecord, Provider, ProviderFuture, RegionSession, ServerSession,
};

/// Public Rackspace identity endpoint.
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_HEADER: &str = "X-Auth-Token";

/// Provider backed by the Rackspace Cloud REST APIs.
#[derive(Clone, Debug)]
pub struct RackspaceProvider {
    client: reqwest::Client,
    identity_url: String,
}

impl RackspaceProvider {
    /// Creates a provider that authenticates against `identity_url`.
    #[must_use]
    pub fn new(identity_url: impl Into<String>) -> Self {
        Self::with_timeout(identity_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a provider whose HTTP requests time out after `timeout`.
    #[must_use]
    pub fn with_timeout(identity_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            identity_url: identity_url.into(),
        }
    }

    fn authorised(request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header(AUTH_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

impl Default for RackspaceProvider {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_URL)
    }
}

/// Status and body of a completed HTTP exchange.
struct Reply {
    status: StatusCode,
    location: Option<String>,
    body: Vec<u8>,
}

impl Reply {
    async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            location,
            body,
        })
    }

    /// Describes a non-success reply for error messages.
    fn describe(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            format!("HTTP {}: {trimmed}", self.status)
        }
    }
}

impl Provider for RackspaceProvider {
    fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> ProviderFuture<'a, Identity> {
        Box::pin(async move { self.exchange_credentials(credentials).await })
    }

    fn resolve_server_id<'a>(
        &'a self,
        session: &'a RegionSession,
        server_name: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move { self.find_server(session, server_name).await })
    }

    fn list_images<'a>(&'a self, session: &'a ServerSession) -> ProviderFuture<'a, Vec<ImageRecord>> {
        Box::pin(async move { self.list_server_images(session).await })
    }

    fn create_image<'a>(
        &'a self,
        session: &'a ServerSession,
        name: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move { self.request_image(session, name).await })
    }

    fn get_image_status<'a>(
        &'a self,
        session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ImageRecord> {
        Box::pin(async move { self.fetch_image(session, image_id).await })
    }

    fn delete_image<'a>(
        &'a self,
        session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move { self.remove_image(session, image_id).await })
    }
}
