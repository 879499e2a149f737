//! Identity exchange and service catalog parsing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RackspaceProvider, Reply};
use crate::provider::{Credentials, Identity, ProviderError};

const COMPUTE_SERVICE_TYPE: &str = "compute";
const COMPUTE_SERVICE_NAME: &str = "cloudServersOpenStack";
const IMAGE_SERVICE_TYPE: &str = "image";

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    credentials: ApiKeyCredentials<'a>,
}

#[derive(Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct Token {
    id: String,
}

#[derive(Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

impl CatalogEntry {
    fn is_compute(&self) -> bool {
        self.service_type == COMPUTE_SERVICE_TYPE && self.name == COMPUTE_SERVICE_NAME
    }

    fn is_image(&self) -> bool {
        self.service_type == IMAGE_SERVICE_TYPE
    }

    fn regional_endpoints(&self) -> impl Iterator<Item = (&str, &str)> {
        self.endpoints.iter().filter_map(|endpoint| {
            endpoint
                .region
                .as_deref()
                .map(|region| (region, endpoint.public_url.as_str()))
        })
    }
}

impl RackspaceProvider {
    pub(super) async fn exchange_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity, ProviderError> {
        let payload = AuthRequest {
            auth: AuthBody {
                credentials: ApiKeyCredentials {
                    username: &credentials.username,
                    api_key: &credentials.api_key,
                },
            },
        };

        let response = self
            .client
            .post(&self.identity_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| auth_error(err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| auth_error(err.to_string()))?;

        if !reply.status.is_success() {
            return Err(auth_error(reply.describe()));
        }

        let identity = parse_identity(&reply.body)?;
        debug!(user = %credentials.username, "identity exchange succeeded");
        Ok(identity)
    }
}

/// Builds an [`Identity`] from an identity service response body.
pub(super) fn parse_identity(body: &[u8]) -> Result<Identity, ProviderError> {
    let parsed: AuthResponse =
        serde_json::from_slice(body).map_err(|err| auth_error(err.to_string()))?;
    if parsed.access.token.id.trim().is_empty() {
        return Err(auth_error(String::from("identity response carried an empty token")));
    }

    let mut identity = Identity::new(parsed.access.token.id);
    for entry in &parsed.access.service_catalog {
        if entry.is_compute() {
            for (region, url) in entry.regional_endpoints() {
                identity = identity.with_compute_endpoint(region, url);
            }
        } else if entry.is_image() {
            for (region, url) in entry.regional_endpoints() {
                identity = identity.with_image_endpoint(region, url);
            }
        }
    }
    Ok(identity)
}

fn auth_error(message: String) -> ProviderError {
    ProviderError::Auth { message }
}
