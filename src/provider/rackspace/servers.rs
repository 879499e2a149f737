//! Server lookup and image creation against the compute API.

use serde::{Deserialize, Serialize};

use super::{RackspaceProvider, Reply};
use crate::provider::{ProviderError, RegionSession, ServerSession};

#[derive(Deserialize)]
struct ServerList {
    #[serde(default)]
    servers: Vec<ServerSummary>,
}

#[derive(Deserialize)]
struct ServerSummary {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct CreateImageAction<'a> {
    #[serde(rename = "createImage")]
    create_image: CreateImageBody<'a>,
}

#[derive(Serialize)]
struct CreateImageBody<'a> {
    name: &'a str,
    metadata: CreateImageMetadata,
}

#[derive(Serialize)]
struct CreateImageMetadata {
    created_by: &'static str,
}

#[derive(Deserialize)]
struct CreateImageResponse {
    image_id: String,
}

impl RackspaceProvider {
    pub(super) async fn find_server(
        &self,
        session: &RegionSession,
        server_name: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/servers/detail", session.servers_url);
        let request = self.client.get(&url).query(&[("name", server_name)]);
        let response = Self::authorised(request, &session.token)
            .send()
            .await
            .map_err(|err| lookup_error(server_name, err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| lookup_error(server_name, err.to_string()))?;

        if !reply.status.is_success() {
            return Err(lookup_error(server_name, reply.describe()));
        }

        select_server(&reply.body, server_name, &session.region)
    }

    pub(super) async fn request_image(
        &self,
        session: &ServerSession,
        name: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/servers/{}/action",
            session.servers_url(),
            session.server_id
        );
        let payload = CreateImageAction {
            create_image: CreateImageBody {
                name,
                metadata: CreateImageMetadata {
                    created_by: "imageroller",
                },
            },
        };

        let response = Self::authorised(self.client.post(&url), session.token())
            .json(&payload)
            .send()
            .await
            .map_err(|err| create_error(name, err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| create_error(name, err.to_string()))?;

        if !reply.status.is_success() {
            return Err(create_error(name, reply.describe()));
        }

        created_image_id(&reply).ok_or_else(|| {
            create_error(
                name,
                String::from("response carried neither a Location header nor an image_id"),
            )
        })
    }
}

/// Picks the server whose name matches exactly; the API filter is a regex.
pub(super) fn select_server(
    body: &[u8],
    server_name: &str,
    region: &str,
) -> Result<String, ProviderError> {
    let list: ServerList =
        serde_json::from_slice(body).map_err(|err| lookup_error(server_name, err.to_string()))?;
    list.servers
        .into_iter()
        .find(|server| server.name == server_name)
        .map(|server| server.id)
        .ok_or_else(|| ProviderError::NotFound {
            server: server_name.to_owned(),
            region: region.to_owned(),
        })
}

fn created_image_id(reply: &Reply) -> Option<String> {
    if let Some(location) = reply.location.as_deref()
        && let Some(id) = location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    {
        return Some(id.to_owned());
    }

    serde_json::from_slice::<CreateImageResponse>(&reply.body)
        .ok()
        .map(|parsed| parsed.image_id)
}

fn lookup_error(server_name: &str, message: String) -> ProviderError {
    ProviderError::Status {
        resource: format!("server '{server_name}'"),
        message,
    }
}

fn create_error(name: &str, message: String) -> ProviderError {
    ProviderError::Create {
        name: name.to_owned(),
        message,
    }
}

#[cfg(test)]
pub(super) fn created_image_id_from(location: Option<&str>, body: &[u8]) -> Option<String> {
    created_image_id(&Reply {
        status: reqwest::StatusCode::ACCEPTED,
        location: location.map(str::to_owned),
        body: body.to_vec(),
    })
}
