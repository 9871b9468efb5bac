//! Suspension policy: how long an engine sits out after a failure.
//!
//! The mapping is an explicit table from [`FailureKind`] to a [`Backoff`]
//! strategy. Transient failures back off exponentially from a short base up
//! to a ceiling; policy failures (CAPTCHA, access denied, rate limiting) use
//! long fixed durations.
//!
//! | kind               | default                         |
//! |--------------------|---------------------------------|
//! | Timeout            | exponential, 5s doubling to 5m  |
//! | ConnectionError    | exponential, 5s doubling to 5m  |
//! | MalformedResponse  | exponential, 10s doubling to 10m|
//! | RateLimited        | fixed 1h                        |
//! | Captcha            | fixed 24h                       |
//! | AccessDenied       | fixed 24h                       |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, SearchError};

/// Longest suspension any strategy may produce: 30 days.
pub const MAX_SUSPENSION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Backoff strategy for one failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Backoff {
    /// `base_secs * 2^(n-1)` for the n-th consecutive failure, capped at
    /// `max_secs`.
    Exponential { base_secs: u64, max_secs: u64 },
    /// The same duration regardless of how many failures preceded it.
    Fixed { secs: u64 },
}

impl Backoff {
    /// Duration for the `consecutive_failures`-th failure in a row.
    /// A count of 0 is treated as 1. Never exceeds [`MAX_SUSPENSION`].
    pub fn duration(&self, consecutive_failures: u32) -> Duration {
        let duration = match *self {
            Self::Fixed { secs } => Duration::from_secs(secs),
            Self::Exponential {
                base_secs,
                max_secs,
            } => {
                let exponent = consecutive_failures.max(1) - 1;
                let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
                Duration::from_secs(base_secs.saturating_mul(factor).min(max_secs))
            }
        };
        duration.min(MAX_SUSPENSION)
    }

    fn validate(&self, kind: FailureKind) -> Result<(), SearchError> {
        match *self {
            Self::Fixed { secs } if secs == 0 => Err(SearchError::Config(format!(
                "suspension for {kind} must be > 0 seconds"
            ))),
            Self::Exponential {
                base_secs,
                max_secs,
            } if base_secs == 0 || max_secs < base_secs => Err(SearchError::Config(format!(
                "suspension for {kind} needs 0 < base_secs <= max_secs"
            ))),
            Self::Fixed { secs } | Self::Exponential { max_secs: secs, .. }
                if secs > MAX_SUSPENSION.as_secs() =>
            {
                Err(SearchError::Config(format!(
                    "suspension for {kind} must not exceed {} seconds",
                    MAX_SUSPENSION.as_secs()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Per-kind suspension table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionPolicy {
    pub timeout: Backoff,
    pub connection_error: Backoff,
    pub malformed_response: Backoff,
    pub rate_limited: Backoff,
    pub captcha: Backoff,
    pub access_denied: Backoff,
}

impl Default for SuspensionPolicy {
    fn default() -> Self {
        Self {
            timeout: Backoff::Exponential {
                base_secs: 5,
                max_secs: 300,
            },
            connection_error: Backoff::Exponential {
                base_secs: 5,
                max_secs: 300,
            },
            malformed_response: Backoff::Exponential {
                base_secs: 10,
                max_secs: 600,
            },
            rate_limited: Backoff::Fixed { secs: 3_600 },
            captcha: Backoff::Fixed { secs: 86_400 },
            access_denied: Backoff::Fixed { secs: 86_400 },
        }
    }
}

impl SuspensionPolicy {
    /// Strategy configured for `kind`.
    pub fn strategy(&self, kind: FailureKind) -> Backoff {
        match kind {
            FailureKind::Timeout => self.timeout,
            FailureKind::ConnectionError => self.connection_error,
            FailureKind::MalformedResponse => self.malformed_response,
            FailureKind::RateLimited => self.rate_limited,
            FailureKind::Captcha => self.captcha,
            FailureKind::AccessDenied => self.access_denied,
        }
    }

    /// How long to suspend an engine after its `consecutive_failures`-th
    /// failure in a row, the latest being of kind `kind`.
    pub fn suspension_duration(&self, kind: FailureKind, consecutive_failures: u32) -> Duration {
        self.strategy(kind).duration(consecutive_failures)
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for zero durations or an exponential
    /// ceiling below its base.
    pub fn validate(&self) -> Result<(), SearchError> {
        for &kind in FailureKind::all() {
            self.strategy(kind).validate(kind)?;
        }
        Ok(())
    }
}
