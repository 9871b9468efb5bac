//! Concurrent fan-out to eligible engines.
//!
//! One task per engine is spawned on a [`JoinSet`]. Each task waits for a
//! concurrency permit, then races its adapter against the engine's own
//! timeout. Collection stops at the request deadline: anything still
//! outstanding is aborted and recorded as [`FailureKind::Timeout`]. Every
//! outcome is reported to the [`HealthTracker`] before `dispatch` returns.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::engine::EngineAdapter;
use crate::error::{EngineError, FailureKind};
use crate::health::{HealthTracker, Outcome};
use crate::types::{EngineId, QueryRequest, RawHit};

/// One engine to invoke.
#[derive(Clone)]
pub struct DispatchTarget {
    pub engine: EngineId,
    pub adapter: Arc<dyn EngineAdapter>,
    /// Overrides the dispatch-wide per-engine timeout.
    pub timeout: Option<Duration>,
}

impl DispatchTarget {
    pub fn new(engine: EngineId, adapter: Arc<dyn EngineAdapter>) -> Self {
        Self {
            engine,
            adapter,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTarget")
            .field("engine", &self.engine)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// What happened to one engine during a dispatch.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub engine: EngineId,
    pub result: Result<Vec<RawHit>, EngineError>,
    pub elapsed: Duration,
}

impl EngineOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(|e| e.kind)
    }

    fn as_health_outcome(&self) -> Outcome {
        match &self.result {
            Ok(_) => Outcome::Success,
            Err(err) => Outcome::Failure(err.kind),
        }
    }
}

/// Per-engine outcomes of one dispatch, in target order. Contains exactly
/// one entry per target.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    outcomes: Vec<EngineOutcome>,
    deadline_elapsed: bool,
}

impl DispatchReport {
    pub fn outcomes(&self) -> &[EngineOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<EngineOutcome> {
        self.outcomes
    }

    pub fn get(&self, engine: &EngineId) -> Option<&EngineOutcome> {
        self.outcomes.iter().find(|o| &o.engine == engine)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether the request deadline cut collection short.
    pub fn deadline_elapsed(&self) -> bool {
        self.deadline_elapsed
    }

    pub fn failed(&self) -> impl Iterator<Item = &EngineOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Fans a query out to engines and feeds the outcomes back into health
/// state.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tracker: Arc<HealthTracker>,
    max_concurrency: usize,
    results_per_engine: Option<usize>,
}

impl Dispatcher {
    /// `max_concurrency` caps simultaneously running adapters within one
    /// dispatch; 0 is treated as 1.
    pub fn new(tracker: Arc<HealthTracker>, max_concurrency: usize) -> Self {
        Self {
            tracker,
            max_concurrency: max_concurrency.max(1),
            results_per_engine: None,
        }
    }

    /// Keep at most `limit` hits from each engine.
    pub fn with_results_per_engine(mut self, limit: usize) -> Self {
        self.results_per_engine = Some(limit);
        self
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    /// Invoke every target concurrently and collect one outcome per target.
    ///
    /// Each adapter is bounded by its own timeout (or `per_engine_timeout`).
    /// When `deadline` passes, outstanding adapters are cancelled and
    /// recorded as timeouts. Never fails as a whole; an empty target list
    /// yields an empty report.
    pub async fn dispatch(
        &self,
        query: &QueryRequest,
        targets: &[DispatchTarget],
        per_engine_timeout: Duration,
        deadline: Option<Instant>,
    ) -> DispatchReport {
        if targets.is_empty() {
            return DispatchReport::default();
        }

        let started = Instant::now();
        let query = Arc::new(query.clone());
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().enumerate() {
            let query = Arc::clone(&query);
            let permits = Arc::clone(&permits);
            let adapter = Arc::clone(&target.adapter);
            let timeout = target.timeout.unwrap_or(per_engine_timeout);

            tasks.spawn(async move {
                let _permit = permits.acquire().await.ok();
                let invoked = Instant::now();
                let call = AssertUnwindSafe(adapter.search(&query)).catch_unwind();
                let result = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(EngineError::malformed("adapter panicked")),
                    Err(_) => Err(EngineError::timeout(format!(
                        "no response within {}ms",
                        timeout.as_millis()
                    ))),
                };
                (index, result, invoked.elapsed())
            });
        }

        let mut slots: Vec<Option<(Result<Vec<RawHit>, EngineError>, Duration)>> =
            (0..targets.len()).map(|_| None).collect();
        let mut deadline_elapsed = false;

        loop {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await
                {
                    Ok(joined) => joined,
                    Err(_) => {
                        deadline_elapsed = true;
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            match joined {
                Some(Ok((index, result, elapsed))) => slots[index] = Some((result, elapsed)),
                Some(Err(err)) => tracing::warn!(error = %err, "engine task ended abnormally"),
                None => break,
            }
        }
        // Late results are discarded.
        tasks.abort_all();

        let outcomes: Vec<EngineOutcome> = targets
            .iter()
            .zip(slots)
            .map(|(target, slot)| {
                let (result, elapsed) = slot.unwrap_or_else(|| {
                    let err = if deadline_elapsed {
                        EngineError::timeout("request deadline elapsed")
                    } else {
                        EngineError::connection("engine task aborted")
                    };
                    (Err(err), started.elapsed())
                });
                let result = result.map(|hits| self.stamp(&target.engine, hits));
                EngineOutcome {
                    engine: target.engine.clone(),
                    result,
                    elapsed,
                }
            })
            .collect();

        let now = Instant::now().into_std();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(hits) => tracing::debug!(
                    engine = %outcome.engine,
                    count = hits.len(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "engine returned results"
                ),
                Err(err) => tracing::warn!(
                    engine = %outcome.engine,
                    error = %err,
                    "engine query failed"
                ),
            }
            self.tracker
                .report_outcome(&outcome.engine, outcome.as_health_outcome(), now);
        }

        DispatchReport {
            outcomes,
            deadline_elapsed,
        }
    }

    /// Attribute hits to the invoked engine and apply the per-engine limit.
    fn stamp(&self, engine: &EngineId, mut hits: Vec<RawHit>) -> Vec<RawHit> {
        if let Some(limit) = self.results_per_engine {
            hits.truncate(limit);
        }
        for hit in &mut hits {
            hit.engine = engine.clone();
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::EngineStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Hits(usize),
        Fail(FailureKind),
        Sleep(Duration),
        Panic,
    }

    struct ScriptedEngine {
        behaviour: Behaviour,
    }

    #[async_trait]
    impl EngineAdapter for ScriptedEngine {
        async fn search(&self, _query: &QueryRequest) -> Result<Vec<RawHit>, EngineError> {
            match &self.behaviour {
                Behaviour::Hits(n) => Ok((1..=*n as u32)
                    .map(|rank| {
                        RawHit::new(
                            EngineId::new("whoever", "general"),
                            rank,
                            format!("https://hit{rank}.com"),
                            "t",
                            "s",
                        )
                    })
                    .collect()),
                Behaviour::Fail(kind) => Err(EngineError::new(*kind, "scripted")),
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(vec![])
                }
                Behaviour::Panic => panic!("scripted panic"),
            }
        }
    }

    fn target(name: &str, behaviour: Behaviour) -> DispatchTarget {
        DispatchTarget::new(
            EngineId::new(name, "general"),
            Arc::new(ScriptedEngine { behaviour }),
        )
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(HealthTracker::default()), 8)
    }

    #[tokio::test]
    async fn empty_target_list_yields_empty_report() {
        let report = dispatcher()
            .dispatch(&QueryRequest::new("q"), &[], Duration::from_secs(1), None)
            .await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn one_outcome_per_target_in_order() {
        let targets = vec![
            target("a", Behaviour::Hits(3)),
            target("b", Behaviour::Fail(FailureKind::Captcha)),
            target("c", Behaviour::Hits(0)),
            target("d", Behaviour::Fail(FailureKind::RateLimited)),
        ];
        let report = dispatcher()
            .dispatch(&QueryRequest::new("q"), &targets, Duration::from_secs(1), None)
            .await;

        let names: Vec<&str> = report.outcomes().iter().map(|o| o.engine.name()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(report.failed().count(), 2);
        assert_eq!(
            report.get(&EngineId::new("b", "general")).and_then(EngineOutcome::failure_kind),
            Some(FailureKind::Captcha)
        );
    }

    #[tokio::test]
    async fn hits_are_stamped_and_truncated() {
        let dispatcher = dispatcher().with_results_per_engine(2);
        let report = dispatcher
            .dispatch(
                &QueryRequest::new("q"),
                &[target("a", Behaviour::Hits(5))],
                Duration::from_secs(1),
                None,
            )
            .await;
        let hits = report.outcomes()[0].result.as_ref().expect("success");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.engine == EngineId::new("a", "general")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_engine_times_out_without_delaying_others() {
        let dispatcher = dispatcher();
        let started = Instant::now();
        let report = dispatcher
            .dispatch(
                &QueryRequest::new("q"),
                &[
                    target("fast", Behaviour::Hits(1)),
                    target("slow", Behaviour::Sleep(Duration::from_secs(5))),
                ],
                Duration::from_secs(2),
                None,
            )
            .await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
        assert!(report.outcomes()[0].is_success());
        assert_eq!(report.outcomes()[1].failure_kind(), Some(FailureKind::Timeout));
        assert!(!report.deadline_elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn per_target_timeout_overrides_default() {
        let report = dispatcher()
            .dispatch(
                &QueryRequest::new("q"),
                &[target("patient", Behaviour::Sleep(Duration::from_secs(3)))
                    .with_timeout(Some(Duration::from_secs(4)))],
                Duration::from_secs(1),
                None,
            )
            .await;
        assert!(report.outcomes()[0].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_marks_outstanding_engines_as_timeouts() {
        let started = Instant::now();
        let report = dispatcher()
            .dispatch(
                &QueryRequest::new("q"),
                &[
                    target("fast", Behaviour::Hits(2)),
                    target("slow", Behaviour::Sleep(Duration::from_secs(30))),
                ],
                Duration::from_secs(60),
                Some(started + Duration::from_secs(1)),
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(report.deadline_elapsed());
        assert!(report.outcomes()[0].is_success());
        assert_eq!(report.outcomes()[1].failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn panicking_adapter_is_isolated() {
        let report = dispatcher()
            .dispatch(
                &QueryRequest::new("q"),
                &[target("boom", Behaviour::Panic), target("ok", Behaviour::Hits(1))],
                Duration::from_secs(1),
                None,
            )
            .await;
        assert_eq!(
            report.outcomes()[0].failure_kind(),
            Some(FailureKind::MalformedResponse)
        );
        assert!(report.outcomes()[1].is_success());
    }

    #[tokio::test]
    async fn outcomes_reported_to_tracker_before_return() {
        let tracker = Arc::new(HealthTracker::default());
        let dispatcher = Dispatcher::new(Arc::clone(&tracker), 4);
        dispatcher
            .dispatch(
                &QueryRequest::new("q"),
                &[
                    target("good", Behaviour::Hits(1)),
                    target("bad", Behaviour::Fail(FailureKind::AccessDenied)),
                ],
                Duration::from_secs(1),
                None,
            )
            .await;

        assert_eq!(
            tracker.status(&EngineId::new("good", "general")),
            EngineStatus::Healthy
        );
        assert!(matches!(
            tracker.status(&EngineId::new("bad", "general")),
            EngineStatus::Suspended { .. }
        ));
        let good = tracker.state(&EngineId::new("good", "general")).expect("reported");
        assert_eq!(good.total_requests, 1);
    }

    struct CountingEngine {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineAdapter for CountingEngine {
        async fn search(&self, _query: &QueryRequest) -> Result<Vec<RawHit>, EngineError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_cap_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let targets: Vec<DispatchTarget> = (0..10)
            .map(|i| {
                DispatchTarget::new(
                    EngineId::new(format!("e{i}"), "general"),
                    Arc::new(CountingEngine {
                        running: Arc::clone(&running),
                        peak: Arc::clone(&peak),
                    }),
                )
            })
            .collect();

        let dispatcher = Dispatcher::new(Arc::new(HealthTracker::default()), 3);
        let report = dispatcher
            .dispatch(&QueryRequest::new("q"), &targets, Duration::from_secs(1), None)
            .await;

        assert_eq!(report.len(), 10);
        assert!(report.outcomes().iter().all(EngineOutcome::is_success));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
