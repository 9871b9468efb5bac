//! Error types for the searchmux-core crate.
//!
//! Only request-level problems surface as [`SearchError`]. Failures of an
//! individual upstream engine are ordinary values ([`EngineError`]) that the
//! dispatcher folds into health state and the response's failed-engine list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors returned to the caller of [`crate::QueryCoordinator::handle`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request itself is unusable (e.g. blank query text).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No engine is registered for any of the requested categories.
    #[error("no engines registered: {0}")]
    NoEnginesRegistered(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for searchmux-core results.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Why a single engine invocation failed.
///
/// Closed set: the suspension policy maps every variant to a backoff
/// strategy, so adding one means extending that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adapter exceeded its per-engine timeout or the request deadline.
    Timeout,
    /// Network-level failure reaching the upstream engine.
    ConnectionError,
    /// Upstream answered with a challenge page.
    Captcha,
    /// Upstream blocked the request (IP block, auth failure).
    AccessDenied,
    /// Upstream signalled too many requests.
    RateLimited,
    /// Upstream responded but the content could not be parsed into hits.
    MalformedResponse,
}

impl FailureKind {
    /// Every failure kind, in declaration order.
    pub fn all() -> &'static [FailureKind] {
        &[
            Self::Timeout,
            Self::ConnectionError,
            Self::Captcha,
            Self::AccessDenied,
            Self::RateLimited,
            Self::MalformedResponse,
        ]
    }

    /// Short human-readable label, used as the unresponsive-engine reason.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection error",
            Self::Captcha => "CAPTCHA",
            Self::AccessDenied => "access denied",
            Self::RateLimited => "too many requests",
            Self::MalformedResponse => "parsing error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A typed failure reported by an [`crate::EngineAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    /// Taxonomy value driving the suspension policy.
    pub kind: FailureKind,
    /// Free-form detail for logs. Never contains credentials.
    pub message: String,
}

impl EngineError {
    /// Build an error of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`FailureKind::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Shorthand for [`FailureKind::ConnectionError`].
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConnectionError, message)
    }

    /// Shorthand for [`FailureKind::MalformedResponse`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }
}
