//! Query embedding capability and an in-memory embedding cache.
//!
//! [`Embedder`] turns text into a fixed-length vector. [`CachedEmbedder`]
//! wraps any embedder with a bounded [`moka`] cache keyed by the trimmed
//! query text, so repeated searches for the same text skip the remote call.
//! The cache is owned by whoever builds it; there is no process-wide state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::config::SearchConfig;
use crate::error::SearchError;

/// Shared, read-only query vector.
pub type Embedding = Arc<Vec<f32>>;

/// Produces embedding vectors for query text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a fixed-length vector.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Embedding`] if the model call fails or returns
    /// an unusable vector.
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError>;

    /// Length of the vectors this embedder returns, if known.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// Composite cache key: the trimmed query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(text: &str) -> Self {
        Self(text.trim().to_string())
    }
}

/// An [`Embedder`] that memoises another embedder's vectors.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<CacheKey, Embedding>,
}

impl CachedEmbedder {
    /// Wrap `inner` with a cache of `capacity` entries that expire after `ttl`.
    pub fn new(inner: Arc<dyn Embedder>, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Wrap `inner` using the cache settings in `config`.
    ///
    /// Returns `inner` unchanged when `embedding_cache_capacity` is 0.
    pub fn from_config(inner: Arc<dyn Embedder>, config: &SearchConfig) -> Arc<dyn Embedder> {
        if config.embedding_cache_capacity == 0 {
            return inner;
        }
        Arc::new(Self::new(
            inner,
            config.embedding_cache_capacity,
            Duration::from_secs(config.embedding_cache_ttl_seconds),
        ))
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
        let key = CacheKey::new(text);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::trace!("embedding cache hit");
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.insert(key, Arc::clone(&vector)).await;
        Ok(vector)
    }

    fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.trim().is_empty() {
                return Err(SearchError::Embedding("empty input".into()));
            }
            Ok(Arc::new(vec![text.len() as f32, 1.0, 0.0]))
        }

        fn dimensions(&self) -> Option<usize> {
            Some(3)
        }
    }

    fn counting() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn cache_key_trims_whitespace() {
        assert_eq!(CacheKey::new("  lung nodule \n"), CacheKey::new("lung nodule"));
    }

    #[test]
    fn cache_key_preserves_case() {
        assert_ne!(CacheKey::new("CT"), CacheKey::new("ct"));
    }

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 16, Duration::from_secs(60));

        let a = cached.embed("pulmonary nodule").await.expect("embed");
        let b = cached.embed(" pulmonary nodule ").await.expect("embed");

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_text_misses_cache() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 16, Duration::from_secs(60));

        cached.embed("liver").await.expect("embed");
        cached.embed("spleen").await.expect("embed");

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 16, Duration::from_secs(60));

        assert!(cached.embed("   ").await.is_err());
        assert!(cached.embed("   ").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let inner = counting();
        let config = SearchConfig {
            embedding_cache_capacity: 0,
            ..Default::default()
        };
        let wrapped = CachedEmbedder::from_config(inner, &config);
        assert_eq!(wrapped.dimensions(), Some(3));
    }

    #[test]
    fn dimensions_delegate_to_inner() {
        let cached = CachedEmbedder::new(counting(), 4, Duration::from_secs(1));
        assert_eq!(cached.dimensions(), Some(3));
    }
}
