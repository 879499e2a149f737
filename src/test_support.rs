//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::sleep;

use crate::lifecycle::Phase;
use crate::observer::LifecycleObserver;
use crate::outcome::Outcome;
use crate::provider::{
    Credentials, Identity, ImageRecord, Provider, ProviderError, ProviderFuture, RegionSession,
    ServerSession,
};

/// Builds an image updated `minutes_old` minutes before `now`.
#[must_use]
pub fn image_at(id: &str, now: DateTime<Utc>, minutes_old: i64, active: bool) -> ImageRecord {
    ImageRecord {
        id: id.to_owned(),
        name: format!("{id}-image"),
        active,
        updated_at: now - TimeDelta::minutes(minutes_old),
    }
}

/// Builds an image updated `minutes_old` minutes ago.
#[must_use]
pub fn image(id: &str, minutes_old: i64, active: bool) -> ImageRecord {
    image_at(id, Utc::now(), minutes_old, active)
}

/// One call received by [`ScriptedProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// Identity exchange.
    Authenticate,
    /// Server name lookup.
    Resolve(String),
    /// Image listing for a server id.
    List(String),
    /// Image creation for a server id with the requested name.
    Create {
        /// Server id.
        server_id: String,
        /// Requested image name.
        name: String,
    },
    /// Status poll of an image id.
    Status(String),
    /// Deletion of an image id.
    Delete(String),
}

impl ProviderCall {
    /// Returns `true` for calls that change provider state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Delete(_))
    }
}

#[derive(Clone, Debug)]
struct ScriptedServer {
    id: String,
    region: String,
    images: Vec<ImageRecord>,
    fail_create: bool,
    fail_status: bool,
    polls_until_active: Option<u32>,
    create_delay: Duration,
}

#[derive(Debug, Default)]
struct ProviderState {
    servers: BTreeMap<String, ScriptedServer>,
    fail_auth: bool,
    fail_delete: BTreeSet<String>,
    saving: BTreeMap<String, Option<u32>>,
    calls: Vec<ProviderCall>,
    next_image: u32,
}

impl ProviderState {
    fn server_by_id(&mut self, server_id: &str) -> Option<&mut ScriptedServer> {
        self.servers
            .values_mut()
            .find(|server| server.id == server_id)
    }

    fn image_mut(&mut self, image_id: &str) -> Option<&mut ImageRecord> {
        self.servers
            .values_mut()
            .flat_map(|server| server.images.iter_mut())
            .find(|image| image.id == image_id)
    }

    fn owner_fails_status(&self, image_id: &str) -> bool {
        self.servers
            .values()
            .any(|server| server.fail_status && server.images.iter().any(|image| image.id == image_id))
    }
}

/// In-memory provider with scripted servers, images, and failures.
///
/// Clones share state, so a test can keep a handle for assertions after
/// handing one to the scheduler. New images finish saving after one status
/// poll unless [`ScriptedProvider::set_polls_until_active`] says otherwise.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    /// Creates a provider with no servers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StdMutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a server; its provider id is `srv-<name>`.
    pub fn add_server(&self, name: &str, region: &str) {
        self.lock().servers.insert(
            name.to_owned(),
            ScriptedServer {
                id: format!("srv-{name}"),
                region: region.to_ascii_uppercase(),
                images: Vec::new(),
                fail_create: false,
                fail_status: false,
                polls_until_active: Some(1),
                create_delay: Duration::ZERO,
            },
        );
    }

    /// Adds an existing image to a registered server.
    pub fn add_image(&self, server: &str, image: ImageRecord) {
        if let Some(entry) = self.lock().servers.get_mut(server) {
            entry.images.push(image);
        }
    }

    /// Makes the identity exchange fail.
    pub fn fail_authentication(&self) {
        self.lock().fail_auth = true;
    }

    /// Makes image creation fail for `server`.
    pub fn fail_create(&self, server: &str) {
        if let Some(entry) = self.lock().servers.get_mut(server) {
            entry.fail_create = true;
        }
    }

    /// Makes status polls of `server`'s images fail.
    pub fn fail_status(&self, server: &str) {
        if let Some(entry) = self.lock().servers.get_mut(server) {
            entry.fail_status = true;
        }
    }

    /// Makes deletion of `image_id` fail.
    pub fn fail_delete(&self, image_id: &str) {
        self.lock().fail_delete.insert(image_id.to_owned());
    }

    /// Sets how many status polls a new image of `server` needs before it
    /// turns active; `None` keeps it saving forever.
    pub fn set_polls_until_active(&self, server: &str, polls: Option<u32>) {
        if let Some(entry) = self.lock().servers.get_mut(server) {
            entry.polls_until_active = polls;
        }
    }

    /// Makes create requests for `server` take `delay` before answering.
    pub fn set_create_delay(&self, server: &str, delay: Duration) {
        if let Some(entry) = self.lock().servers.get_mut(server) {
            entry.create_delay = delay;
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    /// Number of create and delete calls received so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().calls.iter().filter(|call| call.is_write()).count()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current images of `server`.
    #[must_use]
    pub fn images(&self, server: &str) -> Vec<ImageRecord> {
        self.lock()
            .servers
            .get(server)
            .map(|entry| entry.images.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: ProviderCall) -> StdMutexGuard<'_, ProviderState> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    fn identity(state: &ProviderState) -> Identity {
        let regions: BTreeSet<&str> = state
            .servers
            .values()
            .map(|server| server.region.as_str())
            .collect();
        regions
            .into_iter()
            .fold(Identity::new("scripted-token"), |identity, region| {
                let lower = region.to_ascii_lowercase();
                identity
                    .with_compute_endpoint(region, format!("https://{lower}.servers.test/v2"))
                    .with_image_endpoint(region, format!("https://{lower}.images.test/v2"))
            })
    }
}

impl Provider for ScriptedProvider {
    fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> ProviderFuture<'a, Identity> {
        Box::pin(async move {
            let state = self.record(ProviderCall::Authenticate);
            if state.fail_auth {
                return Err(ProviderError::Auth {
                    message: format!("invalid credentials for {}", credentials.username),
                });
            }
            Ok(Self::identity(&state))
        })
    }

    fn resolve_server_id<'a>(
        &'a self,
        session: &'a RegionSession,
        server_name: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let state = self.record(ProviderCall::Resolve(server_name.to_owned()));
            state
                .servers
                .get(server_name)
                .filter(|server| server.region.eq_ignore_ascii_case(&session.region))
                .map(|server| server.id.clone())
                .ok_or_else(|| ProviderError::NotFound {
                    server: server_name.to_owned(),
                    region: session.region.clone(),
                })
        })
    }

    fn list_images<'a>(&'a self, session: &'a ServerSession) -> ProviderFuture<'a, Vec<ImageRecord>> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::List(session.server_id.clone()));
            Ok(state
                .server_by_id(&session.server_id)
                .map(|server| server.images.clone())
                .unwrap_or_default())
        })
    }

    fn create_image<'a>(
        &'a self,
        session: &'a ServerSession,
        name: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let delay = self
                .lock()
                .server_by_id(&session.server_id)
                .map_or(Duration::ZERO, |server| server.create_delay);
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let mut state = self.record(ProviderCall::Create {
                server_id: session.server_id.clone(),
                name: name.to_owned(),
            });
            state.next_image += 1;
            let image_id = format!("img-new-{}", state.next_image);
            let server = state
                .server_by_id(&session.server_id)
                .ok_or_else(|| ProviderError::Create {
                    name: name.to_owned(),
                    message: String::from("unknown server"),
                })?;
            if server.fail_create {
                return Err(ProviderError::Create {
                    name: name.to_owned(),
                    message: String::from("HTTP 409 Conflict: server is busy"),
                });
            }
            server.images.push(ImageRecord {
                id: image_id.clone(),
                name: name.to_owned(),
                active: false,
                updated_at: Utc::now(),
            });
            let polls = server.polls_until_active;
            state.saving.insert(image_id.clone(), polls);
            Ok(image_id)
        })
    }

    fn get_image_status<'a>(
        &'a self,
        _session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ImageRecord> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::Status(image_id.to_owned()));
            if state.owner_fails_status(image_id) {
                return Err(ProviderError::Status {
                    resource: format!("image {image_id}"),
                    message: String::from("HTTP 500 Internal Server Error"),
                });
            }

            let finished = match state.saving.get_mut(image_id) {
                Some(Some(remaining)) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining == 0
                }
                Some(None) => false,
                None => true,
            };
            let image = state
                .image_mut(image_id)
                .ok_or_else(|| ProviderError::Status {
                    resource: format!("image {image_id}"),
                    message: String::from("HTTP 404 Not Found"),
                })?;
            if finished && !image.active {
                image.active = true;
                image.updated_at = Utc::now();
            }
            Ok(image.clone())
        })
    }

    fn delete_image<'a>(
        &'a self,
        session: &'a ServerSession,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.record(ProviderCall::Delete(image_id.to_owned()));
            if state.fail_delete.contains(image_id) {
                return Err(ProviderError::Delete {
                    image_id: image_id.to_owned(),
                    message: String::from("HTTP 403 Forbidden"),
                });
            }
            if let Some(server) = state.server_by_id(&session.server_id) {
                server.images.retain(|image| image.id != image_id);
            }
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct ObserverState {
    phases: Vec<(String, Phase)>,
    outcomes: Vec<Outcome>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Observer that records every event and tracks how many lifecycles are
/// between [`Phase::Init`] and [`Phase::Done`] at once.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl RecordingObserver {
    /// Creates an empty observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StdMutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Phases entered by `server`, in order.
    #[must_use]
    pub fn phases_for(&self, server: &str) -> Vec<Phase> {
        self.lock()
            .phases
            .iter()
            .filter(|(name, _)| name == server)
            .map(|(_, phase)| *phase)
            .collect()
    }

    /// Outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.lock().outcomes.clone()
    }

    /// Highest number of lifecycles observed running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }
}

impl LifecycleObserver for RecordingObserver {
    fn phase_entered(&self, server: &str, phase: Phase) {
        let mut state = self.lock();
        match phase {
            Phase::Init => {
                state.in_flight += 1;
                state.max_in_flight = state.max_in_flight.max(state.in_flight);
            }
            Phase::Done => state.in_flight = state.in_flight.saturating_sub(1),
            _ => {}
        }
        state.phases.push((server.to_owned(), phase));
    }

    fn outcome_recorded(&self, outcome: &Outcome) {
        self.lock().outcomes.push(outcome.clone());
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push((key.to_string(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
