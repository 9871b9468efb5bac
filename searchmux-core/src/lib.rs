//! # searchmux-core
//!
//! Engine rotation and result aggregation for a metasearch service.
//!
//! A [`QueryCoordinator`] takes a [`QueryRequest`], picks the engines that
//! serve the requested categories, leaves out any that are currently
//! suspended, queries the rest concurrently, and merges what comes back
//! into one ranked, deduplicated list.
//!
//! ## Design
//!
//! - Engines are reached through the [`EngineAdapter`] trait; transport and
//!   parsing live outside this crate
//! - Every engine failure is classified by [`FailureKind`] and suspends the
//!   engine for a duration taken from the [`SuspensionPolicy`]
//! - A suspended engine is never contacted until its suspension ends
//! - Slow engines are cut off by per-engine timeouts and a request deadline
//! - Engine failures never fail a request; they are reported alongside the
//!   results
//!
//! ## Security
//!
//! - Query text is logged only at trace level
//!
//! # Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use searchmux_core::{EngineAdapter, EngineSettings, QueryCoordinator, QueryRequest, SearchConfig};
//! # async fn example(ddg: Arc<dyn EngineAdapter>) -> searchmux_core::Result<()> {
//! let config = SearchConfig::default().with_engine(EngineSettings::new("duckduckgo", "general"));
//! let coordinator = QueryCoordinator::new(config, [("duckduckgo", ddg)])?;
//! let response = coordinator.handle(&QueryRequest::new("rust programming")).await?;
//! for result in &response.results {
//!     println!("{}: {}", result.title(), result.url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod policy;
pub mod types;

pub use config::{EngineSettings, SearchConfig};
pub use coordinator::QueryCoordinator;
pub use engine::EngineAdapter;
pub use error::{EngineError, FailureKind, Result, SearchError};
pub use health::{EngineHealthSnapshot, EngineStatus, HealthTracker, Outcome};
pub use orchestrator::dispatch::Dispatcher;
pub use orchestrator::merge::Aggregator;
pub use policy::{Backoff, SuspensionPolicy};
pub use types::{
    AggregateResponse, EngineFailure, EngineId, EngineTiming, MergedResult, QueryRequest, RawHit,
    SafeSearch, SkippedEngine, TimeRange,
};
