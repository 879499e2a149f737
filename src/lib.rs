//! Core library for the imageroller snapshot rotation tool.
//!
//! A run authenticates once, then drives every enabled server through an
//! independent image lifecycle (inspect, create when stale, wait for the save,
//! prune past retention) with at most `ConcurrentWorkers` lifecycles in
//! flight. Provider access goes through the [`Provider`] trait, implemented
//! for Rackspace Cloud by [`RackspaceProvider`].

pub mod check;
pub mod fleet;
pub mod lifecycle;
pub mod logging;
pub mod observer;
pub mod outcome;
pub mod provider;
pub mod retention;
pub mod scheduler;
pub mod settings;
pub mod test_support;

pub use fleet::{AuthConfig, AuthConfigError, FleetConfig, FleetConfigError, ServerConfig};
pub use lifecycle::{ImageLifecycle, Phase};
pub use observer::{LifecycleObserver, TracingObserver};
pub use outcome::{Outcome, OutcomeStatus, RunReport};
pub use provider::rackspace::RackspaceProvider;
pub use provider::{
    Credentials, Identity, ImageRecord, Provider, ProviderError, RegionSession, ServerSession,
};
pub use retention::RetentionPolicy;
pub use scheduler::{Scheduler, SchedulerError};
pub use settings::{Settings, SettingsError};
