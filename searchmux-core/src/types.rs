//! Core types: engine identity, requests, per-engine hits, merged results.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, SearchError};

/// Stable identifier for an upstream engine: its name plus the category it
/// is registered under. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineId {
    name: String,
    category: String,
}

impl EngineId {
    /// Create an identifier. Both parts are taken verbatim.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Engine name as used in allowlists (`engines=` parameter).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category the engine is registered under.
    pub fn category(&self) -> &str {
        &self.category
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Restrict results to a recent time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for TimeRange {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(SearchError::InvalidQuery(format!(
                "unknown time_range '{other}'"
            ))),
        }
    }
}

/// Safe-search filtering level (`safesearch=0|1|2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    #[default]
    Moderate,
    Strict,
}

impl SafeSearch {
    /// Parse the numeric wire level.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for levels above 2.
    pub fn from_level(level: u8) -> Result<Self, SearchError> {
        match level {
            0 => Ok(Self::Off),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Strict),
            other => Err(SearchError::InvalidQuery(format!(
                "safesearch level must be 0, 1 or 2, got {other}"
            ))),
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Moderate => 1,
            Self::Strict => 2,
        }
    }
}

/// One incoming search request. Read-only once handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query text (`q`).
    pub query: String,
    /// Requested categories. Empty means the configured defaults.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Explicit engine-name allowlist (`engines`). Unknown names are dropped.
    #[serde(default)]
    pub engines: Option<Vec<String>>,
    /// Language code (`language`), passed through to adapters.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub safe_search: SafeSearch,
    /// 1-based page number (`pageno`).
    #[serde(default = "first_page")]
    pub page: u32,
    /// Overall deadline for this request, capped by the configured
    /// request timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

fn first_page() -> u32 {
    1
}

impl QueryRequest {
    /// A request for `query` with every filter at its default.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            categories: Vec::new(),
            engines: None,
            language: None,
            time_range: None,
            safe_search: SafeSearch::default(),
            page: 1,
            timeout: None,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engines = Some(engines.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn with_safe_search(mut self, safe_search: SafeSearch) -> Self {
        self.safe_search = safe_search;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the request is usable before any engine is contacted.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for blank query text, a zero
    /// page number or a zero timeout.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".into()));
        }
        if self.page == 0 {
            return Err(SearchError::InvalidQuery("pageno must be >= 1".into()));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SearchError::InvalidQuery("timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// One hit returned by a single engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Engine that produced the hit. The dispatcher overwrites this with the
    /// engine it actually invoked.
    pub engine: EngineId,
    /// Engine-assigned rank, 1-based. 0 is treated as 1.
    pub rank: u32,
}

impl RawHit {
    pub fn new(
        engine: EngineId,
        rank: u32,
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            engine,
            rank,
        }
    }
}

/// A deduplicated, scored result. Built only by the aggregator, so the
/// contributing-engine list is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedResult {
    pub(crate) url: String,
    pub(crate) normalized_url: String,
    pub(crate) title: String,
    pub(crate) snippet: String,
    pub(crate) engines: Vec<EngineId>,
    pub(crate) score: f64,
    pub(crate) position: usize,
}

impl MergedResult {
    /// URL as first reported by the earliest contributing engine.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Canonical dedup key.
    pub fn normalized_url(&self) -> &str {
        &self.normalized_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    /// Contributing engines in first-seen order.
    pub fn engines(&self) -> &[EngineId] {
        &self.engines
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(EngineId::name).collect()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// 1-based position in the final ranking.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// An engine left out of this request because it is suspended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEngine {
    pub engine: EngineId,
    /// Time left until the engine becomes eligible again.
    pub remaining: Duration,
    /// Failure that caused the suspension.
    pub last_failure: Option<FailureKind>,
}

/// An engine that was invoked during this request and failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineFailure {
    pub engine: EngineId,
    pub kind: FailureKind,
    pub message: String,
}

/// Wall-clock time one engine took during this request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineTiming {
    pub engine: EngineId,
    pub elapsed: Duration,
    pub succeeded: bool,
}

/// The unified answer to one [`QueryRequest`].
///
/// An empty `results` list with non-empty `skipped_engines` or
/// `failed_engines` is a successful response, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub query: QueryRequest,
    pub results: Vec<MergedResult>,
    pub skipped_engines: Vec<SkippedEngine>,
    pub failed_engines: Vec<EngineFailure>,
    pub timings: Vec<EngineTiming>,
    pub elapsed: Duration,
    /// Whether the results came from the response cache.
    pub cached: bool,
}

impl AggregateResponse {
    pub fn number_of_results(&self) -> usize {
        self.results.len()
    }

    /// Whether at least one engine was actually invoked.
    pub fn engines_attempted(&self) -> bool {
        !self.timings.is_empty() || self.cached
    }

    /// `(engine name, reason)` pairs for every failed or skipped engine.
    pub fn unresponsive_engines(&self) -> Vec<(String, String)> {
        let failed = self
            .failed_engines
            .iter()
            .map(|f| (f.engine.name().to_owned(), f.kind.label().to_owned()));
        let skipped = self.skipped_engines.iter().map(|s| {
            let reason = match s.last_failure {
                Some(kind) => format!("suspended: {kind}"),
                None => "suspended".to_owned(),
            };
            (s.engine.name().to_owned(), reason)
        });
        failed.chain(skipped).collect()
    }

    pub fn failed_ids(&self) -> Vec<&EngineId> {
        self.failed_engines.iter().map(|f| &f.engine).collect()
    }

    pub fn skipped_ids(&self) -> Vec<&EngineId> {
        self.skipped_engines.iter().map(|s| &s.engine).collect()
    }
}
