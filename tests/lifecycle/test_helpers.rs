//! Shared fixtures for image run scenarios.

use std::time::Duration;

use imageroller::test_support::{RecordingObserver, ScriptedProvider};
use imageroller::{RunReport, ServerConfig};
use rstest::fixture;

pub const SAVE_TIMEOUT: Duration = Duration::from_secs(120 * 60);
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub enum RunResult {
    Completed(RunReport),
    Aborted(String),
}

#[derive(Clone, Debug)]
pub struct RollerContext {
    pub provider: ScriptedProvider,
    pub observer: RecordingObserver,
    pub servers: Vec<ServerConfig>,
    pub result: Option<RunResult>,
}

impl RollerContext {
    pub fn add_server(&mut self, name: &str, retain_minutes: u64) {
        self.provider.add_server(name, "DFW");
        self.servers.push(ServerConfig::new(
            name,
            "DFW",
            SAVE_TIMEOUT,
            Duration::from_secs(retain_minutes * 60),
        ));
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self.result.as_ref() {
            Some(RunResult::Completed(report)) => Some(report),
            _ => None,
        }
    }
}

#[fixture]
pub fn roller_context() -> RollerContext {
    RollerContext {
        provider: ScriptedProvider::new(),
        observer: RecordingObserver::new(),
        servers: Vec::new(),
        result: None,
    }
}
