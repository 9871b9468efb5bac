//! In-memory TTL cache for merged results.
//!
//! Keyed by the normalised request (query text, filters, page) and the
//! sorted candidate engine set. Uses [`moka`] for async-friendly caching
//! with automatic eviction. Each coordinator owns its own cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::types::{EngineId, MergedResult, QueryRequest, SafeSearch, TimeRange};

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 256;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed, whitespace-collapsed query.
    query: String,
    language: Option<String>,
    time_range: Option<TimeRange>,
    safe_search: SafeSearch,
    page: u32,
    /// Hash of the sorted engine set, so `[a, b]` and `[b, a]` match.
    engine_hash: u64,
}

impl CacheKey {
    pub fn new(request: &QueryRequest, engines: &[EngineId]) -> Self {
        let query = request
            .query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self {
            query,
            language: request.language.as_ref().map(|l| l.trim().to_lowercase()),
            time_range: request.time_range,
            safe_search: request.safe_search,
            page: request.page,
            engine_hash: hash_engines(engines),
        }
    }
}

/// Cache of merged result lists.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Cache<CacheKey, Arc<Vec<MergedResult>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Returns `Some(results)` on hit, `None` on miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<MergedResult>>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, results: Vec<MergedResult>) {
        self.inner.insert(key, Arc::new(results)).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

/// Order-independent hash of an engine set.
fn hash_engines(engines: &[EngineId]) -> u64 {
    let mut sorted: Vec<&EngineId> = engines.iter().collect();
    sorted.sort();
    sorted.dedup();
    let mut hasher = DefaultHasher::new();
    for engine in sorted {
        engine.hash(&mut hasher);
    }
    hasher.finish()
}
