//! Query coordinator: candidate resolution, health filtering, fan-out,
//! merging and response assembly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheKey, ResponseCache};
use crate::config::SearchConfig;
use crate::engine::EngineAdapter;
use crate::error::{Result, SearchError};
use crate::health::{EngineHealthSnapshot, HealthTracker};
use crate::orchestrator::dispatch::{DispatchTarget, Dispatcher};
use crate::orchestrator::merge::Aggregator;
use crate::types::{AggregateResponse, EngineFailure, EngineId, EngineTiming, QueryRequest};

/// A configured engine paired with its adapter.
#[derive(Clone)]
struct RegisteredEngine {
    id: EngineId,
    target: DispatchTarget,
}

/// Top-level entry point: turns a [`QueryRequest`] into an
/// [`AggregateResponse`].
///
/// Engine failures never surface as errors from [`QueryCoordinator::handle`];
/// they appear in the response's failed and skipped lists.
pub struct QueryCoordinator {
    config: Arc<SearchConfig>,
    engines: Vec<RegisteredEngine>,
    tracker: Arc<HealthTracker>,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    cache: Option<ResponseCache>,
}

impl QueryCoordinator {
    /// Build a coordinator with a fresh [`HealthTracker`].
    ///
    /// `adapters` maps engine names to adapters. Every enabled engine in
    /// `config` needs one.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid or an enabled
    /// engine has no adapter.
    pub fn new<I, S>(config: SearchConfig, adapters: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Arc<dyn EngineAdapter>)>,
        S: Into<String>,
    {
        let tracker = Arc::new(HealthTracker::new(config.suspension.clone()));
        Self::with_tracker(config, adapters, tracker)
    }

    /// Build a coordinator sharing an existing tracker, so health state
    /// survives a configuration reload.
    ///
    /// The tracker keeps the suspension policy it was created with; a
    /// different `config.suspension` is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Same as [`QueryCoordinator::new`].
    pub fn with_tracker<I, S>(
        config: SearchConfig,
        adapters: I,
        tracker: Arc<HealthTracker>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Arc<dyn EngineAdapter>)>,
        S: Into<String>,
    {
        config.validate()?;
        if tracker.policy() != &config.suspension {
            tracing::warn!("shared health tracker keeps its suspension policy, ignoring reloaded one");
        }
        let mut adapters: HashMap<String, Arc<dyn EngineAdapter>> = adapters
            .into_iter()
            .map(|(name, adapter)| (name.into(), adapter))
            .collect();

        let mut engines = Vec::new();
        let mut used = HashSet::new();
        for settings in config.engines.iter().filter(|e| !e.disabled) {
            let adapter = adapters.get(&settings.name).cloned().ok_or_else(|| {
                SearchError::Config(format!("no adapter for engine '{}'", settings.name))
            })?;
            used.insert(settings.name.clone());
            let id = settings.id();
            tracker.register(&id);
            engines.push(RegisteredEngine {
                target: DispatchTarget::new(id.clone(), adapter).with_timeout(settings.timeout()),
                id,
            });
        }
        adapters.retain(|name, _| !used.contains(name));
        for name in adapters.keys() {
            tracing::warn!(engine = %name, "adapter has no enabled engine in config, ignoring");
        }

        let dispatcher = Dispatcher::new(Arc::clone(&tracker), config.max_concurrent_engines)
            .with_results_per_engine(config.results_per_engine);
        let aggregator = Aggregator::new()
            .with_weights(config.engines.iter().map(|e| (e.id(), e.weight)))
            .with_max_results(config.max_results);
        let cache = (config.cache_ttl_seconds > 0).then(|| {
            ResponseCache::new(std::time::Duration::from_secs(config.cache_ttl_seconds))
        });

        tracing::info!(engines = engines.len(), "query coordinator ready");

        Ok(Self {
            config: Arc::new(config),
            engines,
            tracker,
            dispatcher,
            aggregator,
            cache,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    /// Enabled engines in registration order.
    pub fn engine_ids(&self) -> Vec<EngineId> {
        self.engines.iter().map(|e| e.id.clone()).collect()
    }

    pub fn health_report(&self) -> Vec<EngineHealthSnapshot> {
        self.tracker.health_report(now())
    }

    /// Return every engine to healthy and drop cached results.
    pub fn reset_all(&self) {
        self.tracker.reset_all();
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
        tracing::info!("engine health and response cache reset");
    }

    /// Resolve the candidate engines for `request`, in registration order.
    ///
    /// Candidates are the enabled engines in the requested categories (or
    /// the default categories), narrowed by the allowlist if one is given.
    /// Allowlisted names that match nothing are dropped silently.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NoEnginesRegistered`] if no enabled engine
    /// exists in any requested category.
    pub fn candidates(&self, request: &QueryRequest) -> Result<Vec<EngineId>> {
        let categories: Vec<String> = if request.categories.is_empty() {
            self.config.default_categories.clone()
        } else {
            request.categories.clone()
        };
        let categories: HashSet<String> = categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        let in_categories: Vec<&RegisteredEngine> = self
            .engines
            .iter()
            .filter(|e| categories.contains(&e.id.category().to_lowercase()))
            .collect();
        if in_categories.is_empty() {
            let mut names: Vec<&str> = categories.iter().map(String::as_str).collect();
            names.sort_unstable();
            return Err(SearchError::NoEnginesRegistered(format!(
                "no enabled engine in categories [{}]",
                names.join(", ")
            )));
        }

        let candidates = match &request.engines {
            Some(allowlist) => {
                let allowed: HashSet<&str> = allowlist.iter().map(|n| n.trim()).collect();
                in_categories
                    .into_iter()
                    .filter(|e| allowed.contains(e.id.name()))
                    .map(|e| e.id.clone())
                    .collect()
            }
            None => in_categories.into_iter().map(|e| e.id.clone()).collect(),
        };
        Ok(candidates)
    }

    /// Answer one search request.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for an unusable request and
    /// [`SearchError::NoEnginesRegistered`] when the requested categories
    /// have no engines at all. Engine failures are never errors.
    pub async fn handle(&self, request: &QueryRequest) -> Result<AggregateResponse> {
        request.validate()?;
        let started = tokio::time::Instant::now();
        tracing::trace!(query = %request.query, "handling search request");

        let candidates = self.candidates(request)?;

        let selection = self.tracker.select(&candidates, now());
        if !selection.skipped.is_empty() {
            tracing::debug!(
                skipped = selection.skipped.len(),
                "suspended engines left out of fan-out"
            );
        }

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(request, &candidates));
        // Cached results stand only while every candidate is still eligible.
        if let (Some(cache), Some(key), true) =
            (&self.cache, &cache_key, selection.skipped.is_empty())
        {
            if let Some(results) = cache.get(key).await {
                tracing::debug!(results = results.len(), "serving cached results");
                return Ok(AggregateResponse {
                    query: request.clone(),
                    results: (*results).clone(),
                    skipped_engines: Vec::new(),
                    failed_engines: Vec::new(),
                    timings: Vec::new(),
                    elapsed: started.elapsed(),
                    cached: true,
                });
            }
        }

        let targets: Vec<DispatchTarget> = selection
            .eligible
            .iter()
            .filter_map(|id| self.engines.iter().find(|e| &e.id == id))
            .map(|e| e.target.clone())
            .collect();

        let timeout = match (request.timeout, self.config.request_timeout()) {
            (Some(asked), Some(cap)) => Some(asked.min(cap)),
            (asked, cap) => asked.or(cap),
        };
        // A deadline past the clock's range means no deadline.
        let deadline = timeout.and_then(|t| started.checked_add(t));

        let report = self
            .dispatcher
            .dispatch(request, &targets, self.config.engine_timeout(), deadline)
            .await;

        let mut hits = Vec::with_capacity(report.len());
        let mut failed_engines = Vec::new();
        let mut timings = Vec::with_capacity(report.len());
        for outcome in report.into_outcomes() {
            timings.push(EngineTiming {
                engine: outcome.engine.clone(),
                elapsed: outcome.elapsed,
                succeeded: outcome.is_success(),
            });
            match outcome.result {
                Ok(engine_hits) => hits.push((outcome.engine, engine_hits)),
                Err(err) => failed_engines.push(EngineFailure {
                    engine: outcome.engine,
                    kind: err.kind,
                    message: err.message,
                }),
            }
        }

        let results = self.aggregator.merge(&hits);

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            let complete = selection.skipped.is_empty()
                && failed_engines.is_empty()
                && targets.len() == candidates.len();
            if complete && !targets.is_empty() {
                cache.insert(key, results.clone()).await;
            }
        }

        let response = AggregateResponse {
            query: request.clone(),
            results,
            skipped_engines: selection.skipped,
            failed_engines,
            timings,
            elapsed: started.elapsed(),
            cached: false,
        };

        tracing::info!(
            results = response.number_of_results(),
            attempted = response.timings.len(),
            failed = response.failed_engines.len(),
            skipped = response.skipped_engines.len(),
            elapsed_ms = response.elapsed.as_millis() as u64,
            "search complete"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for QueryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCoordinator")
            .field("engines", &self.engine_ids())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Current instant on the runtime clock, so paused-time tests and health
/// state agree.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
