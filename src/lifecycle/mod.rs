//! Per-server image lifecycle.
//!
//! One [`ImageLifecycle::run`] call drives a single server from name
//! resolution through inspection, the create decision, saving, and pruning.
//! Every provider failure is folded into the server's [`Outcome`]; nothing
//! escapes to the caller.

mod wait;

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::fleet::ServerConfig;
use crate::observer::LifecycleObserver;
use crate::outcome::Outcome;
use crate::provider::{Identity, ImageRecord, Provider, ProviderError, RegionSession, ServerSession};
use crate::retention::{self, RetentionPolicy};

pub use wait::SaveState;
use wait::save_deadline;

/// Default interval between image status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// States of the per-server lifecycle, in the order they are entered.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Phase {
    /// Lifecycle admitted to a worker slot.
    Init,
    /// Server name resolved to a provider id.
    Resolved,
    /// Existing images listed.
    Inspected,
    /// Create decision taken.
    Decided,
    /// Create request issued.
    Creating,
    /// Waiting for the new image to become active.
    Saving,
    /// Deleting stale images.
    Pruning,
    /// Outcome recorded.
    Done,
}

impl Phase {
    /// Lower-case phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Resolved => "resolved",
            Self::Inspected => "inspected",
            Self::Decided => "decided",
            Self::Creating => "creating",
            Self::Saving => "saving",
            Self::Pruning => "pruning",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one server's images through a single run.
pub struct ImageLifecycle<'a, P: ?Sized, O: ?Sized> {
    provider: &'a P,
    observer: &'a O,
    poll_interval: Duration,
    force: bool,
}

/// What a run that reached pruning accomplished.
#[derive(Debug, Default)]
struct Completion {
    created: Option<String>,
    save: Option<SaveState>,
    pending: bool,
    deleted: Vec<String>,
    failures: Vec<ProviderError>,
}

impl Completion {
    fn into_outcome(self, server: &str) -> Outcome {
        let pruned = format!("pruned {} stale image(s)", self.deleted.len());

        if !self.failures.is_empty() {
            let reasons: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
            return Outcome::error(
                server,
                format!(
                    "{pruned}; {} deletion(s) failed: {}",
                    self.failures.len(),
                    reasons.join("; ")
                ),
            );
        }

        match (self.created, self.save) {
            (Some(image_id), Some(SaveState::TimedOut)) => Outcome::timeout(
                server,
                format!("image {image_id} still saving at save timeout; {pruned}"),
            ),
            (Some(image_id), _) => {
                Outcome::success(server, format!("created image {image_id}; {pruned}"))
            }
            (None, _) if self.pending => Outcome::success(
                server,
                format!("image save already in progress; {pruned}"),
            ),
            (None, _) => Outcome::success(server, format!("fresh image present; {pruned}")),
        }
    }
}

impl<'a, P, O> ImageLifecycle<'a, P, O>
where
    P: Provider + ?Sized,
    O: LifecycleObserver + ?Sized,
{
    /// Creates a lifecycle bound to a provider and observer.
    #[must_use]
    pub const fn new(provider: &'a P, observer: &'a O) -> Self {
        Self {
            provider,
            observer,
            poll_interval: DEFAULT_POLL_INTERVAL,
            force: false,
        }
    }

    /// Overrides the interval between status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Creates an image even when a fresh one exists.
    ///
    /// A still-saving image continues to block creation.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Runs the lifecycle for `server` and returns its outcome.
    pub async fn run(&self, identity: &Identity, server: &ServerConfig) -> Outcome {
        self.enter(server, Phase::Init);
        let outcome = match self.drive(identity, server).await {
            Ok(completion) => completion.into_outcome(&server.name),
            Err(err) => Outcome::error(&server.name, err.to_string()),
        };
        self.enter(server, Phase::Done);
        self.observer.outcome_recorded(&outcome);
        outcome
    }

    async fn drive(
        &self,
        identity: &Identity,
        server: &ServerConfig,
    ) -> Result<Completion, ProviderError> {
        let region = RegionSession::open(identity, &server.region)?;
        let server_id = self.provider.resolve_server_id(&region, &server.name).await?;
        let session = region.into_server_session(server_id);
        self.enter(server, Phase::Resolved);

        let images = self.provider.list_images(&session).await?;
        let (active, pending) = retention::partition(&images);
        info!(
            server = %server.name,
            active = active.len(),
            pending = pending.len(),
            "inspected images"
        );
        self.enter(server, Phase::Inspected);

        let policy = RetentionPolicy::new(server.retain_window);
        let mut completion = Completion {
            pending: !pending.is_empty(),
            ..Completion::default()
        };
        let create = if self.force {
            !completion.pending
        } else {
            policy.should_create(&images, Utc::now())
        };
        self.enter(server, Phase::Decided);

        if create {
            let (image_id, save) = self.create_and_wait(server, &session).await?;
            completion.created = Some(image_id);
            completion.save = Some(save);
        }

        self.enter(server, Phase::Pruning);
        let stale = policy.stale_images(&images, Utc::now(), completion.created.as_deref());
        self.prune(server, &session, &stale, &mut completion).await;
        Ok(completion)
    }

    async fn create_and_wait(
        &self,
        server: &ServerConfig,
        session: &ServerSession,
    ) -> Result<(String, SaveState), ProviderError> {
        let deadline = save_deadline(Instant::now(), server.save_timeout);
        self.enter(server, Phase::Creating);
        let name = image_name(&server.name);
        let image_id = self.provider.create_image(session, &name).await?;
        info!(server = %server.name, %image_id, image_name = %name, "requested image");

        self.enter(server, Phase::Saving);
        let save = self
            .wait_for_active(session, &image_id, deadline)
            .await?;
        if matches!(save, SaveState::TimedOut) {
            warn!(server = %server.name, %image_id, "image did not become active before the save timeout");
        }
        Ok((image_id, save))
    }

    async fn prune(
        &self,
        server: &ServerConfig,
        session: &ServerSession,
        stale: &[ImageRecord],
        completion: &mut Completion,
    ) {
        for image in stale {
            match self.provider.delete_image(session, &image.id).await {
                Ok(()) => {
                    info!(server = %server.name, image_id = %image.id, "deleted stale image");
                    completion.deleted.push(image.id.clone());
                }
                Err(err) => {
                    warn!(server = %server.name, image_id = %image.id, error = %err, "failed to delete stale image");
                    completion.failures.push(err);
                }
            }
        }
    }

    fn enter(&self, server: &ServerConfig, phase: Phase) {
        self.observer.phase_entered(&server.name, phase);
    }
}

/// Builds the image name for `server` at the current time.
#[must_use]
pub fn image_name(server: &str) -> String {
    format!("{server}-{}", Utc::now().format("%Y%m%d%H%M%S"))
}
