//! Hooks for watching lifecycles progress.
//!
//! The scheduler hands one observer to every lifecycle it drives, so the
//! observer is the only place where cross-server reporting happens.

use tracing::{debug, error, info, warn};

use crate::lifecycle::Phase;
use crate::outcome::{Outcome, OutcomeStatus};

/// Receives lifecycle progress events.
pub trait LifecycleObserver: Send + Sync {
    /// Called whenever a server's lifecycle enters `phase`.
    fn phase_entered(&self, server: &str, phase: Phase);

    /// Called once per server with its terminal outcome.
    fn outcome_recorded(&self, outcome: &Outcome);
}

/// Observer that forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn phase_entered(&self, server: &str, phase: Phase) {
        debug!(server, %phase, "entered phase");
    }

    fn outcome_recorded(&self, outcome: &Outcome) {
        match outcome.status {
            OutcomeStatus::Success => {
                info!(server = %outcome.server, detail = %outcome.detail, "lifecycle succeeded");
            }
            OutcomeStatus::Timeout => {
                warn!(server = %outcome.server, detail = %outcome.detail, "lifecycle timed out");
            }
            OutcomeStatus::Error => {
                error!(server = %outcome.server, detail = %outcome.detail, "lifecycle failed");
            }
        }
    }
}

impl<T: LifecycleObserver + ?Sized> LifecycleObserver for &T {
    fn phase_entered(&self, server: &str, phase: Phase) {
        (**self).phase_entered(server, phase);
    }

    fn outcome_recorded(&self, outcome: &Outcome) {
        (**self).outcome_recorded(outcome);
    }
}
