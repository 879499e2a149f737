//! Nagios-style freshness check for one server's images.
//!
//! Shares the provider and data model with the orchestrator but never writes.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::provider::{Credentials, ImageRecord, Provider, ProviderError, RegionSession};
use crate::retention::newest_active;

const SECONDS_PER_HOUR: u64 = 3600;

/// Check result, ordered by severity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CheckStatus {
    /// Newest image is younger than the warning threshold.
    Ok,
    /// Newest image passed the warning threshold.
    Warning,
    /// Newest image passed the critical threshold, or none exists.
    Critical,
    /// The check could not run.
    Unknown,
}

impl CheckStatus {
    /// Conventional plugin exit code.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }

    /// Upper-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that make the check's result UNKNOWN.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CheckError {
    /// Warning threshold exceeds the critical one.
    #[error("warning threshold ({warning_hours}h) exceeds critical threshold ({critical_hours}h)")]
    InvertedThresholds {
        /// Warning threshold in hours.
        warning_hours: u64,
        /// Critical threshold in hours.
        critical_hours: u64,
    },
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Age thresholds for the check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Thresholds {
    warning: Duration,
    critical: Duration,
}

impl Thresholds {
    /// Builds thresholds from whole hours.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::InvertedThresholds`] when `warning_hours` is
    /// greater than `critical_hours`.
    pub const fn from_hours(warning_hours: u64, critical_hours: u64) -> Result<Self, CheckError> {
        if warning_hours > critical_hours {
            return Err(CheckError::InvertedThresholds {
                warning_hours,
                critical_hours,
            });
        }
        Ok(Self {
            warning: Duration::from_secs(warning_hours.saturating_mul(SECONDS_PER_HOUR)),
            critical: Duration::from_secs(critical_hours.saturating_mul(SECONDS_PER_HOUR)),
        })
    }
}

/// Status plus the line printed for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckReport {
    /// Resulting status.
    pub status: CheckStatus,
    /// Human-readable detail.
    pub message: String,
}

impl CheckReport {
    /// Builds an UNKNOWN report from an error.
    #[must_use]
    pub fn unknown(err: &CheckError) -> Self {
        Self {
            status: CheckStatus::Unknown,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status, self.message)
    }
}

/// Classifies a server's images by the age of the newest active one.
#[must_use]
pub fn evaluate(
    server: &str,
    images: &[ImageRecord],
    thresholds: Thresholds,
    now: DateTime<Utc>,
) -> CheckReport {
    let Some(newest) = newest_active(images) else {
        return CheckReport {
            status: CheckStatus::Critical,
            message: format!("no active image found for {server}"),
        };
    };

    let elapsed = now
        .signed_duration_since(newest.updated_at)
        .max(TimeDelta::zero());
    let age = elapsed.to_std().unwrap_or_default();
    let status = if age >= thresholds.critical {
        CheckStatus::Critical
    } else if age >= thresholds.warning {
        CheckStatus::Warning
    } else {
        CheckStatus::Ok
    };

    CheckReport {
        status,
        message: format!(
            "newest image {} for {server} is {}h{:02}m old",
            newest.id,
            elapsed.num_hours(),
            elapsed.num_minutes() - elapsed.num_hours() * 60
        ),
    }
}

/// Authenticates, lists `server`'s images in `region`, and evaluates them.
///
/// # Errors
///
/// Returns [`CheckError::Provider`] when any provider call fails.
pub async fn run_check<P: Provider + ?Sized>(
    provider: &P,
    credentials: &Credentials,
    server: &str,
    region: &str,
    thresholds: Thresholds,
) -> Result<CheckReport, CheckError> {
    let identity = provider.authenticate(credentials).await?;
    let region_session = RegionSession::open(&identity, region)?;
    let server_id = provider.resolve_server_id(&region_session, server).await?;
    let session = region_session.into_server_session(server_id);
    let images = provider.list_images(&session).await?;
    Ok(evaluate(server, &images, thresholds, Utc::now()))
}
