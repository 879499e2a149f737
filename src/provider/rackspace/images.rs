//! Image listing, status, and deletion against the images API.

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::warn;

use super::{RackspaceProvider, Reply};
use crate::provider::{ImageRecord, ProviderError, ServerSession};

const ACTIVE_STATUS: &str = "active";
const DISCARDED_STATUSES: [&str; 3] = ["killed", "deleted", "pending_delete"];
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;

#[derive(Deserialize)]
struct ImagePage {
    #[serde(default)]
    images: Vec<ImageBody>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct ImageBody {
    id: String,
    #[serde(default)]
    name: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl ImageBody {
    fn is_discarded(&self) -> bool {
        DISCARDED_STATUSES.contains(&self.status.as_str())
    }

    fn into_record(self) -> ImageRecord {
        ImageRecord {
            active: self.status == ACTIVE_STATUS,
            id: self.id,
            name: self.name,
            updated_at: self.updated_at,
        }
    }
}

impl RackspaceProvider {
    pub(super) async fn list_server_images(
        &self,
        session: &ServerSession,
    ) -> Result<Vec<ImageRecord>, ProviderError> {
        let resource = format!("images of server {}", session.server_id);
        let mut url = Url::parse(&format!("{}/images", session.images_url()))
            .map_err(|err| status_error(&resource, err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("instance_uuid", &session.server_id)
            .append_pair("image_type", "snapshot")
            .append_pair("limit", PAGE_SIZE);

        let mut records = Vec::new();
        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(session, &url, &resource).await?;
            records.extend(
                page.images
                    .into_iter()
                    .filter(|image| !image.is_discarded())
                    .map(ImageBody::into_record),
            );

            let Some(next) = page.next else {
                return Ok(records);
            };
            url = url
                .join(&next)
                .map_err(|err| status_error(&resource, err.to_string()))?;
        }

        warn!(
            server_id = %session.server_id,
            pages = MAX_PAGES,
            "image listing exceeded the page limit"
        );
        Err(page_limit_error(&resource))
    }

    async fn fetch_page(
        &self,
        session: &ServerSession,
        url: &Url,
        resource: &str,
    ) -> Result<ImagePage, ProviderError> {
        let response = Self::authorised(self.client.get(url.clone()), session.token())
            .send()
            .await
            .map_err(|err| status_error(resource, err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| status_error(resource, err.to_string()))?;

        if !reply.status.is_success() {
            return Err(status_error(resource, reply.describe()));
        }

        serde_json::from_slice(&reply.body).map_err(|err| status_error(resource, err.to_string()))
    }

    pub(super) async fn fetch_image(
        &self,
        session: &ServerSession,
        image_id: &str,
    ) -> Result<ImageRecord, ProviderError> {
        let resource = format!("image {image_id}");
        let url = format!("{}/images/{image_id}", session.images_url());
        let response = Self::authorised(self.client.get(&url), session.token())
            .send()
            .await
            .map_err(|err| status_error(&resource, err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| status_error(&resource, err.to_string()))?;

        if !reply.status.is_success() {
            return Err(status_error(&resource, reply.describe()));
        }

        parse_image(&reply.body, image_id)
    }

    pub(super) async fn remove_image(
        &self,
        session: &ServerSession,
        image_id: &str,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/images/{image_id}", session.images_url());
        let response = Self::authorised(self.client.delete(&url), session.token())
            .send()
            .await
            .map_err(|err| delete_error(image_id, err.to_string()))?;
        let reply = Reply::read(response)
            .await
            .map_err(|err| delete_error(image_id, err.to_string()))?;

        if reply.status.is_success() || reply.status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(delete_error(image_id, reply.describe()))
    }
}

/// Parses a single image body; images that failed to save are an error.
pub(super) fn parse_image(body: &[u8], image_id: &str) -> Result<ImageRecord, ProviderError> {
    let resource = format!("image {image_id}");
    let image: ImageBody =
        serde_json::from_slice(body).map_err(|err| status_error(&resource, err.to_string()))?;
    if image.is_discarded() {
        return Err(status_error(
            &resource,
            format!("image entered state '{}'", image.status),
        ));
    }
    Ok(image.into_record())
}

/// Parses an image listing page, dropping discarded images.
#[cfg(test)]
pub(super) fn parse_listing(
    body: &[u8],
) -> Result<(Vec<ImageRecord>, Option<String>), ProviderError> {
    let page: ImagePage =
        serde_json::from_slice(body).map_err(|err| status_error("images", err.to_string()))?;
    let records = page
        .images
        .into_iter()
        .filter(|image| !image.is_discarded())
        .map(ImageBody::into_record)
        .collect();
    Ok((records, page.next))
}

pub(super) fn page_limit_error(resource: &str) -> ProviderError {
    status_error(
        resource,
        format!("listing still paginating after {MAX_PAGES} pages"),
    )
}

fn status_error(resource: &str, message: String) -> ProviderError {
    ProviderError::Status {
        resource: resource.to_owned(),
        message,
    }
}

fn delete_error(image_id: &str, message: String) -> ProviderError {
    ProviderError::Delete {
        image_id: image_id.to_owned(),
        message,
    }
}
