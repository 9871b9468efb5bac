//! Trait definition for pluggable upstream engine adapters.
//!
//! Each upstream engine (its query building, HTTP exchange and result
//! scraping) lives behind [`EngineAdapter`]. The core never looks inside an
//! adapter; it only invokes it under a timeout and classifies the outcome.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{QueryRequest, RawHit};

/// A single upstream search engine.
///
/// Implementations must not retry without bound: any retries are the
/// adapter's private concern and still race the dispatcher's timeout, after
/// which the invocation is dropped.
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Run `query` against the upstream engine.
    ///
    /// Hits should carry 1-based engine ranks. The `engine` field of each
    /// hit is overwritten by the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] whose [`crate::FailureKind`] drives how
    /// long the engine is suspended afterwards.
    async fn search(&self, query: &QueryRequest) -> Result<Vec<RawHit>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::types::EngineId;
    use std::sync::Arc;

    /// A mock engine for testing trait bounds and async execution.
    struct MockEngine {
        id: EngineId,
        urls: Vec<&'static str>,
    }

    #[async_trait]
    impl EngineAdapter for MockEngine {
        async fn search(&self, _query: &QueryRequest) -> Result<Vec<RawHit>, EngineError> {
            if self.urls.is_empty() {
                return Err(EngineError::new(FailureKind::Captcha, "mock challenge"));
            }
            Ok(self
                .urls
                .iter()
                .zip(1..)
                .map(|(url, rank)| RawHit::new(self.id.clone(), rank, *url, "title", "snippet"))
                .collect())
        }
    }

    #[test]
    fn adapter_trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EngineAdapter>();
    }

    #[tokio::test]
    async fn mock_engine_returns_ranked_hits() {
        let engine: Arc<dyn EngineAdapter> = Arc::new(MockEngine {
            id: EngineId::new("mock", "general"),
            urls: vec!["https://a.com", "https://b.com"],
        });
        let hits = engine
            .search(&QueryRequest::new("test"))
            .await
            .expect("should succeed");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
    }

    #[tokio::test]
    async fn mock_engine_propagates_typed_errors() {
        let engine = MockEngine {
            id: EngineId::new("mock", "general"),
            urls: vec![],
        };
        let err = engine.search(&QueryRequest::new("test")).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Captcha);
    }
}
