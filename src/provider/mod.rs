//! Provider abstraction for the image lifecycle.
//!
//! The orchestration core only talks to the cloud through [`Provider`]. The
//! Rackspace adapter in [`rackspace`] implements it over the identity,
//! servers, and images REST APIs; tests use the scripted provider from
//! [`crate::test_support`].

mod error;
pub mod rackspace;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use error::ProviderError;
pub use types::{Credentials, Identity, ImageRecord, RegionSession, ServerSession};

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Operations the orchestration core needs from a cloud provider.
///
/// Every call is a single request/response exchange; the core never retries
/// on its own beyond the bounded save-status poll.
pub trait Provider: Send + Sync {
    /// Performs the identity exchange and returns the token plus the
    /// per-region service endpoints.
    fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> ProviderFuture<'a, Identity>;

    /// Resolves a server name to the provider's server identifier.
    fn resolve_server_id<'a>(
        &'a self,
        session: &'a RegionSession,
        server_name: &'a str,
    ) -> ProviderFuture<'a, String>;

    /// Lists the snapshot images associated with the session's server.
    fn list_images<'a>(&'a self, session: &'a ServerSession) -> ProviderFuture<'a, Vec<ImageRecord>>;

    /// Requests a new image of the session's server and returns its id.
    fn create_image<'a>(
        &'a self,
        session: &'a ServerSession,
        name: &'a str,
    ) -> ProviderFuture<'a, String>;

    /// Fetches the current state of a single image.
    fn get_image_status<'a>(
        &'a self,
        session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ImageRecord>;

    /// Deletes an image.
    fn delete_image<'a>(
        &'a self,
        session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ()>;
}
