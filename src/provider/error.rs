//! Error types for provider operations.

use thiserror::Error;

/// Errors raised by provider operations.
///
/// Each variant corresponds to one failure kind of the image lifecycle.
/// Only [`ProviderError::Auth`] is fatal for a whole run; everything else is
/// confined to the server that triggered it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when the identity exchange is rejected or unreachable.
    #[error("authentication failed: {message}")]
    Auth {
        /// Message describing the failure.
        message: String,
    },
    /// Raised when no server matches the configured name.
    #[error("server '{server}' not found in region {region}")]
    NotFound {
        /// Configured server name.
        server: String,
        /// Region that was searched.
        region: String,
    },
    /// Raised when the service catalog has no endpoint for the region.
    #[error("no {service} endpoint available in region {region}")]
    MissingEndpoint {
        /// Service type that was looked up (`compute` or `image`).
        service: String,
        /// Region requested by the server configuration.
        region: String,
    },
    /// Raised when the provider rejects an image creation request.
    #[error("failed to create image '{name}': {message}")]
    Create {
        /// Requested image name.
        name: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when listing images or reading an image status fails.
    #[error("failed to query {resource}: {message}")]
    Status {
        /// Resource being queried.
        resource: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the provider rejects an image deletion.
    #[error("failed to delete image {image_id}: {message}")]
    Delete {
        /// Image identifier.
        image_id: String,
        /// Message returned by the provider.
        message: String,
    },
}
