//! Per-server outcomes and the run-level report built from them.

use std::fmt;

/// Terminal status of one server's lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OutcomeStatus {
    /// Every required create and delete succeeded.
    Success,
    /// The new image did not become active within the save timeout.
    Timeout,
    /// A provider operation failed.
    Error,
}

impl OutcomeStatus {
    /// Upper-case label used in status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one server's lifecycle for a single run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    /// Configured server name.
    pub server: String,
    /// Terminal status.
    pub status: OutcomeStatus,
    /// Human-readable detail.
    pub detail: String,
}

impl Outcome {
    /// Builds a successful outcome.
    #[must_use]
    pub fn success(server: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(server, OutcomeStatus::Success, detail)
    }

    /// Builds a timed-out outcome.
    #[must_use]
    pub fn timeout(server: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(server, OutcomeStatus::Timeout, detail)
    }

    /// Builds a failed outcome.
    #[must_use]
    pub fn error(server: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(server, OutcomeStatus::Error, detail)
    }

    fn new(server: impl Into<String>, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.server, self.status, self.detail)
    }
}

/// Outcomes of every enabled server in one run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunReport {
    outcomes: Vec<Outcome>,
}

impl RunReport {
    /// Wraps a set of outcomes.
    #[must_use]
    pub const fn new(outcomes: Vec<Outcome>) -> Self {
        Self { outcomes }
    }

    /// Outcomes in completion order.
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Finds the outcome recorded for `server`.
    #[must_use]
    pub fn outcome_for(&self, server: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|outcome| outcome.server == server)
    }

    /// Number of outcomes with `status`.
    #[must_use]
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    /// Returns `true` when any server ended in [`OutcomeStatus::Error`].
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count(OutcomeStatus::Error) > 0
    }

    /// Process exit code for the run: non-zero only when a server failed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }

    /// One-line tally of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} servers: {} succeeded, {} timed out, {} failed",
            self.outcomes.len(),
            self.count(OutcomeStatus::Success),
            self.count(OutcomeStatus::Timeout),
            self.count(OutcomeStatus::Error),
        )
    }
}
