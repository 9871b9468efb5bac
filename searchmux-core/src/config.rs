//! Search configuration snapshot with sensible defaults.
//!
//! [`SearchConfig`] is injected into the coordinator and never mutated by
//! it. It derives serde traits so an outer layer can load it from a file;
//! this crate does not read any file format itself.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::policy::SuspensionPolicy;
use crate::types::EngineId;

/// Category used when neither the request nor an engine names one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Static settings for one registered engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine name, matched against request allowlists.
    pub name: String,
    /// Category the engine is registered under.
    #[serde(default = "default_category")]
    pub category: String,
    /// Multiplier applied to this engine's rank contributions.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Per-engine timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Operator hard-disable. Disabled engines are never candidates.
    #[serde(default)]
    pub disabled: bool,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

fn default_weight() -> f64 {
    1.0
}

impl EngineSettings {
    /// Enabled engine with default weight and timeout.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            weight: default_weight(),
            timeout_ms: None,
            disabled: false,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn id(&self) -> EngineId {
        EngineId::new(&self.name, &self.category)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration snapshot for the query coordinator.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Registered engines, in registration order. Order is the tie-break
    /// for equally scored results.
    pub engines: Vec<EngineSettings>,
    /// Categories searched when a request names none.
    pub default_categories: Vec<String>,
    /// Default per-engine timeout in milliseconds.
    pub engine_timeout_ms: u64,
    /// Ceiling on the whole request in milliseconds. Requests may ask for a
    /// shorter deadline, never a longer one.
    pub request_timeout_ms: Option<u64>,
    /// Hits kept per engine before merging.
    pub results_per_engine: usize,
    /// Merged results returned per request. `None` keeps all.
    pub max_results: Option<usize>,
    /// Engines invoked concurrently within one request.
    pub max_concurrent_engines: usize,
    pub suspension: SuspensionPolicy,
    /// Response cache lifetime in seconds. 0 disables the cache.
    pub cache_ttl_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engines: Vec::new(),
            default_categories: vec![default_category()],
            engine_timeout_ms: 3_000,
            request_timeout_ms: Some(10_000),
            results_per_engine: 20,
            max_results: None,
            max_concurrent_engines: 16,
            suspension: SuspensionPolicy::default(),
            cache_ttl_seconds: 0,
        }
    }
}

impl SearchConfig {
    /// Add an engine to the snapshot.
    pub fn with_engine(mut self, engine: EngineSettings) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `engine_timeout_ms`, `results_per_engine` and
    ///   `max_concurrent_engines` must be greater than 0
    /// - `request_timeout_ms` and `max_results`, when set, must be greater than 0
    /// - every engine has a non-empty name and category, a positive finite
    ///   weight, a non-zero timeout override, and a unique (name, category)
    /// - the suspension table has no zero durations
    ///
    /// An empty engine list is valid; requests against it fail with
    /// [`SearchError::NoEnginesRegistered`].
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.engine_timeout_ms == 0 {
            return Err(SearchError::Config(
                "engine_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(SearchError::Config(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.results_per_engine == 0 {
            return Err(SearchError::Config(
                "results_per_engine must be greater than 0".into(),
            ));
        }
        if self.max_results == Some(0) {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_engines == 0 {
            return Err(SearchError::Config(
                "max_concurrent_engines must be greater than 0".into(),
            ));
        }
        if self.default_categories.is_empty() {
            return Err(SearchError::Config(
                "default_categories must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for engine in &self.engines {
            if engine.name.trim().is_empty() || engine.category.trim().is_empty() {
                return Err(SearchError::Config(
                    "engine name and category must not be empty".into(),
                ));
            }
            if !engine.weight.is_finite() || engine.weight <= 0.0 {
                return Err(SearchError::Config(format!(
                    "engine '{}' weight must be a positive number",
                    engine.name
                )));
            }
            if engine.timeout_ms == Some(0) {
                return Err(SearchError::Config(format!(
                    "engine '{}' timeout_ms must be greater than 0",
                    engine.name
                )));
            }
            if !seen.insert(engine.id()) {
                return Err(SearchError::Config(format!(
                    "engine '{}' registered twice in category '{}'",
                    engine.name, engine.category
                )));
            }
        }

        self.suspension.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Backoff;

    fn sample() -> SearchConfig {
        SearchConfig::default()
            .with_engine(EngineSettings::new("duckduckgo", "general"))
            .with_engine(EngineSettings::new("wikipedia", "general").with_weight(1.5))
    }

    #[test]
    fn default_config_has_sensible_values() {
        let config = SearchConfig::default();
        assert_eq!(config.engine_timeout(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.results_per_engine, 20);
        assert_eq!(config.default_categories, vec!["general".to_owned()]);
        assert_eq!(config.cache_ttl_seconds, 0);
        assert!(config.max_results.is_none());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_engine_list_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_engine_timeout_rejected() {
        let config = SearchConfig {
            engine_timeout_ms: 0,
            ..sample()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine_timeout_ms"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = SearchConfig {
            max_concurrent_engines: 0,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_results_rejected() {
        let config = SearchConfig {
            max_results: Some(0),
            ..sample()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_results"));
    }

    #[test]
    fn duplicate_engine_rejected() {
        let config = sample().with_engine(EngineSettings::new("duckduckgo", "general"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn same_name_in_two_categories_allowed() {
        let config = sample().with_engine(EngineSettings::new("duckduckgo", "images"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_weight_rejected() {
        let config = sample().with_engine(EngineSettings::new("bing", "general").with_weight(0.0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("weight"));

        let config =
            sample().with_engine(EngineSettings::new("bing", "general").with_weight(f64::NAN));
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_suspension_table_rejected() {
        let mut config = sample();
        config.suspension.rate_limited = Backoff::Fixed { secs: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_timeout_override() {
        let engine = EngineSettings::new("qwant", "general").with_timeout(Duration::from_millis(1500));
        assert_eq!(engine.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(engine.id(), EngineId::new("qwant", "general"));
    }

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{"engines":[{"name":"brave"}],"engine_timeout_ms":2000}"#;
        let config: SearchConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.engine_timeout_ms, 2000);
        assert_eq!(config.engines[0].category, "general");
        assert!((config.engines[0].weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.results_per_engine, 20);
        assert!(config.validate().is_ok());
    }
}
