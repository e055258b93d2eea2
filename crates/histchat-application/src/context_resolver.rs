//! Bounded retrieval with explicit degraded-mode signalling.

use histchat_core::config::PromptConfig;
use histchat_core::context::{ContextStore, RetrievalOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Wraps an optional `ContextStore` with the retrieval toggle, `top_k` and
/// a timeout.
///
/// Never fails: errors and timeouts become `RetrievalOutcome::Failed` so the
/// caller can fall back to stored documents and still report the
/// degradation.
#[derive(Clone)]
pub struct ContextResolver {
    store: Option<Arc<dyn ContextStore>>,
    enabled: bool,
    top_k: usize,
    timeout: Duration,
}

impl ContextResolver {
    pub fn new(
        store: Option<Arc<dyn ContextStore>>,
        enabled: bool,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            enabled,
            top_k,
            timeout,
        }
    }

    pub fn from_config(store: Option<Arc<dyn ContextStore>>, config: &PromptConfig) -> Self {
        Self::new(
            store,
            config.rag_enabled,
            config.retrieval_top_k,
            Duration::from_millis(config.retrieval_timeout_ms),
        )
    }

    /// A resolver that never retrieves.
    pub fn disabled() -> Self {
        Self::new(None, false, 0, Duration::ZERO)
    }

    pub async fn resolve(&self, figure_slug: Option<&str>, query: &str) -> RetrievalOutcome {
        let (Some(store), Some(slug)) = (self.store.as_ref(), figure_slug) else {
            return RetrievalOutcome::Skipped;
        };
        if !self.enabled || self.top_k == 0 {
            return RetrievalOutcome::Skipped;
        }

        match tokio::time::timeout(self.timeout, store.query(slug, query, self.top_k)).await {
            Ok(Ok(chunks)) => {
                tracing::debug!("Retrieved {} chunks for figure '{}'", chunks.len(), slug);
                RetrievalOutcome::Hits(chunks)
            }
            Ok(Err(err)) => {
                tracing::warn!("Retrieval failed for figure '{}': {}", slug, err);
                RetrievalOutcome::Failed(err.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "Retrieval timed out after {}ms for figure '{}'",
                    self.timeout.as_millis(),
                    slug
                );
                RetrievalOutcome::Failed(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use histchat_core::HistchatError;
    use histchat_core::context::ContextChunk;
    use histchat_core::error::Result;

    struct MockContextStore {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ContextStore for MockContextStore {
        async fn query(&self, _slug: &str, _query: &str, top_k: usize) -> Result<Vec<ContextChunk>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(HistchatError::upstream("retrieval", "index offline"));
            }
            Ok((0..top_k).map(|i| ContextChunk::new(format!("chunk {i}"))).collect())
        }
    }

    fn resolver(delay_ms: u64, fail: bool) -> ContextResolver {
        ContextResolver::new(
            Some(Arc::new(MockContextStore {
                delay: Duration::from_millis(delay_ms),
                fail,
            })),
            true,
            2,
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn test_hits_are_returned() {
        let outcome = resolver(0, false).resolve(Some("cleopatra"), "q").await;
        assert_eq!(outcome.chunks().len(), 2);
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_failure_and_timeout_are_degraded() {
        let failed = resolver(0, true).resolve(Some("cleopatra"), "q").await;
        assert!(failed.is_degraded());
        assert!(failed.chunks().is_empty());

        let slow = resolver(1_000, false).resolve(Some("cleopatra"), "q").await;
        assert!(matches!(slow, RetrievalOutcome::Failed(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_skipped_without_store_or_figure() {
        assert_eq!(
            ContextResolver::disabled().resolve(Some("x"), "q").await,
            RetrievalOutcome::Skipped
        );
        assert_eq!(resolver(0, false).resolve(None, "q").await, RetrievalOutcome::Skipped);
    }
}
