//! Per-engine health tracking and time-bounded suspension.
//!
//! Every failure suspends the engine for a duration chosen by the
//! [`SuspensionPolicy`]. Once the suspension has expired the engine is
//! handed out again the next time it is selected, and its status flips back
//! to healthy at that moment, so a recovering engine gets exactly one trial
//! per selection cycle. The failure streak is kept until a success, so a
//! failed trial backs off further.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐   failure (any kind)    ┌───────────────────────┐
//! │ Healthy ├────────────────────────►│ Suspended { until }   │
//! └───▲──▲──┘                         └──────────┬────────────┘
//!     │  │   selected with until <= now          │
//!     │  └───────────────────────────────────────┘
//!     │ success (streak reset)
//! ```
//!
//! Each engine's state sits behind its own mutex. The map of engines is
//! only write-locked when an engine is registered for the first time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::FailureKind;
use crate::policy::{SuspensionPolicy, MAX_SUSPENSION};
use crate::types::{EngineId, SkippedEngine};

/// Availability of a single engine. The recovery instant exists only while
/// suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Healthy,
    Suspended { until: Instant },
}

/// Outcome of one engine invocation, fed back into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureKind),
}

/// Health tracking data for a single engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub status: EngineStatus,
    /// Failures since the last success. Survives the optimistic reset on
    /// recovery so repeated failures keep escalating the backoff.
    pub consecutive_failures: u32,
    pub last_failure: Option<FailureKind>,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    /// Lifetime number of reported outcomes.
    pub total_requests: u64,
    /// Lifetime number of reported failures.
    pub total_failures: u64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status: EngineStatus::Healthy,
            consecutive_failures: 0,
            last_failure: None,
            last_failure_at: None,
            last_success_at: None,
            total_requests: 0,
            total_failures: 0,
        }
    }
}

impl EngineState {
    pub fn suspended_until(&self) -> Option<Instant> {
        match self.status {
            EngineStatus::Healthy => None,
            EngineStatus::Suspended { until } => Some(until),
        }
    }
}

/// Result of filtering a candidate list against current health.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Candidates that may be invoked now, in candidate order.
    pub eligible: Vec<EngineId>,
    /// Candidates still inside their suspension window.
    pub skipped: Vec<SkippedEngine>,
}

/// Serialisable view of one engine's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineHealthSnapshot {
    pub engine: EngineId,
    pub suspended: bool,
    /// Time left in the current suspension, if any.
    pub suspended_for: Option<Duration>,
    pub consecutive_failures: u32,
    pub last_failure: Option<FailureKind>,
    pub total_requests: u64,
    pub total_failures: u64,
}

/// Shared health state for every registered engine.
#[derive(Debug)]
pub struct HealthTracker {
    policy: SuspensionPolicy,
    engines: RwLock<HashMap<EngineId, Arc<Mutex<EngineState>>>>,
}

impl HealthTracker {
    /// Create an empty tracker using `policy` for suspension lengths.
    pub fn new(policy: SuspensionPolicy) -> Self {
        Self {
            policy,
            engines: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &SuspensionPolicy {
        &self.policy
    }

    /// Create healthy state for `id` unless it already exists.
    pub fn register(&self, id: &EngineId) {
        let _ = self.slot(id);
    }

    /// Split `candidates` into engines that may run now and engines still
    /// suspended at `now`.
    ///
    /// Engines whose suspension ended at or before `now` are returned as
    /// eligible and marked healthy immediately.
    pub fn select(&self, candidates: &[EngineId], now: Instant) -> Selection {
        let mut selection = Selection::default();
        for id in candidates {
            let slot = self.slot(id);
            let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());
            match state.status {
                EngineStatus::Healthy => selection.eligible.push(id.clone()),
                EngineStatus::Suspended { until } if until <= now => {
                    tracing::info!(engine = %id, "suspension expired, allowing trial request");
                    state.status = EngineStatus::Healthy;
                    selection.eligible.push(id.clone());
                }
                EngineStatus::Suspended { until } => {
                    selection.skipped.push(SkippedEngine {
                        engine: id.clone(),
                        remaining: until.saturating_duration_since(now),
                        last_failure: state.last_failure,
                    });
                }
            }
        }
        selection
    }

    /// Candidates eligible at `now`. See [`HealthTracker::select`].
    pub fn eligible_engines(&self, candidates: &[EngineId], now: Instant) -> Vec<EngineId> {
        self.select(candidates, now).eligible
    }

    /// Fold one invocation outcome into `id`'s state and return its new
    /// status.
    ///
    /// Success clears the failure streak. Any failure extends the streak
    /// and suspends the engine until `now + policy(kind, streak)`.
    pub fn report_outcome(&self, id: &EngineId, outcome: Outcome, now: Instant) -> EngineStatus {
        let slot = self.slot(id);
        let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());
        state.total_requests += 1;

        match outcome {
            Outcome::Success => {
                state.status = EngineStatus::Healthy;
                state.consecutive_failures = 0;
                state.last_success_at = Some(now);
            }
            Outcome::Failure(kind) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.total_failures += 1;
                state.last_failure = Some(kind);
                state.last_failure_at = Some(now);

                let duration = self
                    .policy
                    .suspension_duration(kind, state.consecutive_failures);
                let until = now
                    .checked_add(duration)
                    .or_else(|| now.checked_add(MAX_SUSPENSION))
                    .unwrap_or(now);
                state.status = EngineStatus::Suspended { until };
                tracing::warn!(
                    engine = %id,
                    failure = %kind,
                    consecutive = state.consecutive_failures,
                    suspended_secs = duration.as_secs(),
                    "engine suspended"
                );
            }
        }
        state.status
    }

    /// Current status of `id`. Unknown engines are healthy.
    pub fn status(&self, id: &EngineId) -> EngineStatus {
        self.state(id).map_or(EngineStatus::Healthy, |s| s.status)
    }

    /// Copy of `id`'s state, if it has been registered.
    pub fn state(&self, id: &EngineId) -> Option<EngineState> {
        let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
        engines
            .get(id)
            .map(|slot| slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Health of every registered engine, ordered by engine id.
    pub fn health_report(&self, now: Instant) -> Vec<EngineHealthSnapshot> {
        let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
        let mut report: Vec<EngineHealthSnapshot> = engines
            .iter()
            .map(|(id, slot)| {
                let state = slot.lock().unwrap_or_else(|e| e.into_inner());
                let until = state.suspended_until();
                EngineHealthSnapshot {
                    engine: id.clone(),
                    suspended: until.is_some(),
                    suspended_for: until.map(|t| t.saturating_duration_since(now)),
                    consecutive_failures: state.consecutive_failures,
                    last_failure: state.last_failure,
                    total_requests: state.total_requests,
                    total_failures: state.total_failures,
                }
            })
            .collect();
        report.sort_by(|a, b| a.engine.cmp(&b.engine));
        report
    }

    /// Return `id` to a fresh healthy state. The engine stays registered.
    pub fn reset(&self, id: &EngineId) {
        let slot = self.slot(id);
        *slot.lock().unwrap_or_else(|e| e.into_inner()) = EngineState::default();
    }

    /// Reset every registered engine.
    pub fn reset_all(&self) {
        let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
        for slot in engines.values() {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = EngineState::default();
        }
    }

    fn slot(&self, id: &EngineId) -> Arc<Mutex<EngineState>> {
        {
            let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = engines.get(id) {
                return Arc::clone(slot);
            }
        }
        let mut engines = self.engines.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(engines.entry(id.clone()).or_default())
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(SuspensionPolicy::default())
    }
}
