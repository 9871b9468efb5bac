//! Simulated engine adapters.
//!
//! A [`SimulatedEngine`] behaves like a remote search engine without
//! touching the network: it waits a random latency, fails with a
//! configured probability, and otherwise returns hits generated from the
//! query text. Half of every hit list points at URLs shared by all
//! simulated engines so merging has duplicates to collapse.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use searchmux_core::config::DEFAULT_CATEGORY;
use searchmux_core::{EngineAdapter, EngineError, EngineId, EngineSettings, FailureKind, QueryRequest, RawHit};

/// One `[[simulated]]` entry in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedEngineConfig {
    pub name: String,
    pub category: String,
    /// Ranking weight passed through to the engine's settings.
    pub weight: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    /// Probability in `[0, 1]` that a call fails.
    pub failure_rate: f64,
    pub failure_kind: FailureKind,
    /// Hits returned per successful call.
    pub results: usize,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            category: DEFAULT_CATEGORY.to_owned(),
            weight: 1.0,
            min_latency_ms: 50,
            max_latency_ms: 400,
            failure_rate: 0.0,
            failure_kind: FailureKind::Timeout,
            results: 10,
            seed: None,
        }
    }
}

impl SimulatedEngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        self.max_latency_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_failures(mut self, rate: f64, kind: FailureKind) -> Self {
        self.failure_rate = rate;
        self.failure_kind = kind;
        self
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = results;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Engine settings registered with the coordinator for this entry.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::new(self.name.clone(), self.category.clone()).with_weight(self.weight)
    }

    /// Checks the entry is usable.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("simulated engine name must not be empty".into());
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(format!(
                "simulated engine '{}': min_latency_ms exceeds max_latency_ms",
                self.name
            ));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(format!(
                "simulated engine '{}': failure_rate must be between 0 and 1",
                self.name
            ));
        }
        Ok(())
    }
}

/// An [`EngineAdapter`] with scripted latency, failures and hits.
#[derive(Debug)]
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &SimulatedEngineConfig {
        &self.config
    }

    /// Draw this call's latency and whether it fails.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let latency = rng.gen_range(self.config.min_latency_ms..=self.config.max_latency_ms);
        let fails = rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0));
        (Duration::from_millis(latency), fails)
    }

    /// Deterministic hits for `query`, ranked from 1.
    pub fn hits_for(&self, query: &str) -> Vec<RawHit> {
        let slug = slugify(query);
        let engine = EngineId::new(self.config.name.clone(), self.config.category.clone());
        let shared = self.config.results / 2;
        (1..=self.config.results)
            .map(|i| {
                let url = if i <= shared {
                    format!("https://shared-{i}.example.org/{slug}")
                } else {
                    format!("https://{}.example.com/{slug}/{i}", self.config.name)
                };
                let rank = u32::try_from(i).unwrap_or(u32::MAX);
                RawHit::new(
                    engine.clone(),
                    rank,
                    url,
                    format!("{query} result {i}"),
                    format!("Simulated result {i} from {} for \"{query}\"", self.config.name),
                )
            })
            .collect()
    }
}

#[async_trait]
impl EngineAdapter for SimulatedEngine {
    async fn search(&self, query: &QueryRequest) -> Result<Vec<RawHit>, EngineError> {
        let (latency, fails) = self.roll();
        tokio::time::sleep(latency).await;
        if fails {
            let kind = self.config.failure_kind;
            return Err(EngineError::new(kind, format!("simulated {}", kind.label())));
        }
        Ok(self.hits_for(&query.query))
    }
}

/// Lowercase alphanumeric words joined by `-`.
fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Docker  containers!"), "docker-containers");
        assert_eq!(slugify("C++ / Rust"), "c-rust");
    }

    #[test]
    fn hits_are_deterministic_and_ranked() {
        let engine = SimulatedEngine::new(SimulatedEngineConfig::new("alpha").with_results(4));
        let first = engine.hits_for("rust");
        let second = engine.hits_for("rust");
        assert_eq!(first, second);
        let ranks: Vec<u32> = first.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn engines_share_half_their_urls() {
        let a = SimulatedEngine::new(SimulatedEngineConfig::new("alpha").with_results(4));
        let b = SimulatedEngine::new(SimulatedEngineConfig::new("beta").with_results(4));
        let a_urls: Vec<String> = a.hits_for("q").into_iter().map(|h| h.url).collect();
        let b_urls: Vec<String> = b.hits_for("q").into_iter().map(|h| h.url).collect();
        let shared = a_urls.iter().filter(|u| b_urls.contains(u)).count();
        assert_eq!(shared, 2);
    }

    #[test]
    fn validate_rejects_bad_entries() {
        assert!(SimulatedEngineConfig::default().validate().is_err());
        let inverted = SimulatedEngineConfig::new("x")
            .with_latency(Duration::from_millis(500), Duration::from_millis(100));
        assert!(inverted.validate().is_err());
        let rate = SimulatedEngineConfig::new("x").with_failures(1.5, FailureKind::Captcha);
        assert!(rate.validate().is_err());
        assert!(SimulatedEngineConfig::new("x").validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_engine_reports_its_kind() {
        let engine = SimulatedEngine::new(
            SimulatedEngineConfig::new("blocked")
                .with_failures(1.0, FailureKind::RateLimited)
                .with_seed(7),
        );
        let err = engine.search(&QueryRequest::new("q")).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_engine_returns_configured_hit_count() {
        let engine = SimulatedEngine::new(
            SimulatedEngineConfig::new("fine")
                .with_results(6)
                .with_latency(Duration::from_millis(10), Duration::from_millis(10))
                .with_seed(1),
        );
        let hits = engine.search(&QueryRequest::new("machine learning")).await.expect("hits");
        assert_eq!(hits.len(), 6);
        assert!(hits[0].url.ends_with("/machine-learning"));
    }
}
