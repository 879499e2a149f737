//! Bounded-concurrency dispatch of lifecycles across the fleet.

use std::num::NonZeroUsize;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{Instrument, info, info_span};

use crate::fleet::ServerConfig;
use crate::lifecycle::{DEFAULT_POLL_INTERVAL, ImageLifecycle};
use crate::observer::LifecycleObserver;
use crate::outcome::RunReport;
use crate::provider::{Credentials, Provider, ProviderError};

/// Errors that abort a whole run.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SchedulerError {
    /// The worker cap was zero.
    #[error("concurrent workers must be greater than 0")]
    NoWorkers,
    /// The shared identity exchange failed, so no server was processed.
    #[error("run aborted: {0}")]
    Authentication(#[source] ProviderError),
}

/// Runs one lifecycle per enabled server, at most `workers` at a time.
#[derive(Debug)]
pub struct Scheduler<P, O> {
    provider: P,
    observer: O,
    workers: NonZeroUsize,
    poll_interval: Duration,
    force: bool,
}

impl<P, O> Scheduler<P, O>
where
    P: Provider,
    O: LifecycleObserver,
{
    /// Creates a scheduler with the given worker cap.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoWorkers`] when `workers` is zero.
    pub fn new(provider: P, observer: O, workers: usize) -> Result<Self, SchedulerError> {
        let cap = NonZeroUsize::new(workers).ok_or(SchedulerError::NoWorkers)?;
        Ok(Self {
            provider,
            observer,
            workers: cap,
            poll_interval: DEFAULT_POLL_INTERVAL,
            force: false,
        })
    }

    /// Overrides the save-status poll interval for every lifecycle.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Forces image creation on every server without a pending save.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Authenticates once, then drives every enabled server to an outcome.
    ///
    /// Outcomes arrive in completion order, one per enabled server.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Authentication`] when the identity exchange
    /// fails; no server work is attempted in that case.
    pub async fn run(
        &self,
        credentials: &Credentials,
        servers: &[ServerConfig],
    ) -> Result<RunReport, SchedulerError> {
        let identity = self
            .provider
            .authenticate(credentials)
            .await
            .map_err(SchedulerError::Authentication)?;

        let enabled: Vec<&ServerConfig> = servers.iter().filter(|server| server.enabled).collect();
        info!(
            servers = enabled.len(),
            workers = self.workers.get(),
            "starting image run"
        );

        let lifecycle = ImageLifecycle::new(&self.provider, &self.observer)
            .with_poll_interval(self.poll_interval)
            .with_force(self.force);
        let shared = &identity;
        let runner = &lifecycle;
        let outcomes = stream::iter(enabled)
            .map(|server| {
                let span = info_span!("server", name = %server.name, region = %server.region);
                runner.run(shared, server).instrument(span)
            })
            .buffer_unordered(self.workers.get())
            .collect::<Vec<_>>()
            .await;

        Ok(RunReport::new(outcomes))
    }
}
