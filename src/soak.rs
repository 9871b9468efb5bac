//! Continuous-operation soak harness.
//!
//! Issues a run of consecutive searches against one coordinator, cycling
//! through a fixed query list with a pause between searches, and tallies
//! how the engine pool held up: how many searches succeeded, which engines
//! contributed results, and which engines dropped out along the way.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use searchmux_core::{AggregateResponse, QueryCoordinator, QueryRequest};

use crate::error::{Error, Result};

/// Query rotation used when none is configured.
pub const DEFAULT_QUERIES: &[&str] = &[
    "python programming",
    "machine learning",
    "docker containers",
    "kubernetes deployment",
    "artificial intelligence",
    "web development",
    "data science",
    "cloud computing",
    "cybersecurity",
    "blockchain technology",
];

/// Success rate (percent) at or above which a run is excellent.
pub const EXCELLENT_RATE: f64 = 95.0;
/// Success rate (percent) at or above which a run passes.
pub const PASS_RATE: f64 = 80.0;

/// How a soak run is driven.
#[derive(Debug, Clone)]
pub struct SoakOptions {
    pub searches: usize,
    /// Pause between consecutive searches.
    pub delay: Duration,
    pub queries: Vec<String>,
}

impl Default for SoakOptions {
    fn default() -> Self {
        Self {
            searches: 20,
            delay: Duration::from_secs(1),
            queries: DEFAULT_QUERIES.iter().map(|q| (*q).to_owned()).collect(),
        }
    }
}

impl SoakOptions {
    pub fn with_searches(mut self, searches: usize) -> Self {
        self.searches = searches;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queries = queries.into_iter().map(Into::into).collect();
        self
    }
}

/// One search in a soak run, handed to the progress callback.
#[derive(Debug)]
pub struct SearchRecord<'a> {
    /// 1-based position in the run.
    pub index: usize,
    pub query: &'a str,
    pub elapsed: Duration,
    pub outcome: std::result::Result<&'a AggregateResponse, &'a searchmux_core::SearchError>,
}

/// Overall classification of a soak run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    Warning,
}

impl Verdict {
    pub fn from_rate(success_rate: f64) -> Self {
        if success_rate >= EXCELLENT_RATE {
            Self::Excellent
        } else if success_rate >= PASS_RATE {
            Self::Good
        } else {
            Self::Warning
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT: ready for continuous operation",
            Self::Good => "GOOD: continuous operation works with minor issues",
            Self::Warning => "WARNING: success rate is lower than expected, check configuration",
        }
    }
}

/// Tallies from a soak run.
#[derive(Debug, Clone, Serialize)]
pub struct SoakReport {
    pub started_at: DateTime<Utc>,
    pub total_searches: usize,
    pub successful_searches: usize,
    pub failed_searches: usize,
    pub total_results: usize,
    /// Merged results each engine contributed to.
    pub engine_results: BTreeMap<String, usize>,
    /// Searches in which each engine failed or was skipped as suspended.
    pub unresponsive_counts: BTreeMap<String, usize>,
    /// Latest reason recorded for each unresponsive engine.
    pub unresponsive_reasons: BTreeMap<String, String>,
    #[serde(with = "duration_secs")]
    pub response_times: Vec<Duration>,
}

impl SoakReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_searches: 0,
            successful_searches: 0,
            failed_searches: 0,
            total_results: 0,
            engine_results: BTreeMap::new(),
            unresponsive_counts: BTreeMap::new(),
            unresponsive_reasons: BTreeMap::new(),
            response_times: Vec::new(),
        }
    }

    fn record(&mut self, elapsed: Duration, outcome: std::result::Result<&AggregateResponse, ()>) {
        self.total_searches += 1;
        self.response_times.push(elapsed);
        let Ok(response) = outcome else {
            self.failed_searches += 1;
            return;
        };
        self.successful_searches += 1;
        self.total_results += response.number_of_results();
        for result in &response.results {
            for name in result.engine_names() {
                *self.engine_results.entry(name.to_owned()).or_default() += 1;
            }
        }
        for (name, reason) in response.unresponsive_engines() {
            *self.unresponsive_counts.entry(name.clone()).or_default() += 1;
            self.unresponsive_reasons.insert(name, reason);
        }
    }

    /// Percentage of searches that returned a response.
    pub fn success_rate(&self) -> f64 {
        if self.total_searches == 0 {
            return 0.0;
        }
        self.successful_searches as f64 / self.total_searches as f64 * 100.0
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_rate(self.success_rate())
    }

    /// Whether the run meets the pass threshold.
    pub fn passed(&self) -> bool {
        self.success_rate() >= PASS_RATE
    }

    pub fn average_results(&self) -> f64 {
        self.total_results as f64 / self.successful_searches.max(1) as f64
    }

    pub fn average_response_time(&self) -> Option<Duration> {
        let count = u32::try_from(self.response_times.len()).ok().filter(|n| *n > 0)?;
        Some(self.response_times.iter().sum::<Duration>() / count)
    }

    pub fn min_response_time(&self) -> Option<Duration> {
        self.response_times.iter().min().copied()
    }

    pub fn max_response_time(&self) -> Option<Duration> {
        self.response_times.iter().max().copied()
    }

    /// Engines by contributed results, most first. Ties keep name order.
    pub fn top_engines(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut engines: Vec<(&str, usize)> = self
            .engine_results
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        engines.sort_by(|a, b| b.1.cmp(&a.1));
        engines.truncate(limit);
        engines
    }
}

/// Run a soak test without progress output.
///
/// # Errors
///
/// See [`run_with_progress`].
pub async fn run(coordinator: &QueryCoordinator, options: &SoakOptions) -> Result<SoakReport> {
    run_with_progress(coordinator, options, |_| {}).await
}

/// Run a soak test, calling `progress` after every search.
///
/// Searches that fail with an error count as failed searches; they do not
/// stop the run.
///
/// # Errors
///
/// Returns [`Error::Soak`] if `options` asks for no searches or has an
/// empty query list.
pub async fn run_with_progress<F>(
    coordinator: &QueryCoordinator,
    options: &SoakOptions,
    mut progress: F,
) -> Result<SoakReport>
where
    F: FnMut(&SearchRecord<'_>),
{
    if options.searches == 0 {
        return Err(Error::Soak("searches must be greater than 0".into()));
    }
    if options.queries.is_empty() {
        return Err(Error::Soak("query list is empty".into()));
    }

    let mut report = SoakReport::new();
    tracing::info!(
        searches = options.searches,
        delay_ms = options.delay.as_millis() as u64,
        "soak run started"
    );

    for index in 0..options.searches {
        let query = &options.queries[index % options.queries.len()];
        let started = tokio::time::Instant::now();
        let outcome = coordinator.handle(&QueryRequest::new(query.as_str())).await;
        let elapsed = started.elapsed();

        report.record(elapsed, outcome.as_ref().map_err(|_| ()));
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "soak search failed");
        }
        progress(&SearchRecord {
            index: index + 1,
            query,
            elapsed,
            outcome: outcome.as_ref(),
        });

        if index + 1 < options.searches {
            tokio::time::sleep(options.delay).await;
        }
    }

    tracing::info!(
        successful = report.successful_searches,
        failed = report.failed_searches,
        "soak run finished"
    );
    Ok(report)
}

/// Serialises durations as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(times: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(times.len()))?;
        for time in times {
            seq.serialize_element(&time.as_secs_f64())?;
        }
        seq.end()
    }
}
