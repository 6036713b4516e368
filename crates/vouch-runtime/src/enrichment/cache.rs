//! Per-domain cache in front of an enrichment lookup.
//!
//! Both hits and confirmed misses are cached. Errors are not, so a failing
//! service is asked again on the next request.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use vouch_core::RepresentativeRecord;

use super::{EnrichmentError, EnrichmentLookup};
use crate::config::EnrichmentConfig;

pub struct CachedLookup {
    inner: Arc<dyn EnrichmentLookup>,
    cache: Cache<String, Option<RepresentativeRecord>>,
}

impl CachedLookup {
    pub fn new(inner: Arc<dyn EnrichmentLookup>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    pub fn from_config(inner: Arc<dyn EnrichmentLookup>, config: &EnrichmentConfig) -> Self {
        Self::new(inner, config.cache_capacity, config.cache_ttl)
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl EnrichmentLookup for CachedLookup {
    async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError> {
        let key = domain.to_ascii_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(domain = %key, "Enrichment cache hit");
            return Ok(hit);
        }

        let result = self.inner.lookup(&key).await?;
        self.cache.insert(key, result.clone()).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockLookup;

    #[tokio::test]
    async fn test_hits_skip_inner_lookup() {
        let inner = Arc::new(MockLookup::found("hr@acme.example"));
        let cached = CachedLookup::new(inner.clone(), 100, Duration::from_secs(60));

        let first = cached.lookup("acme.example").await.unwrap();
        let second = cached.lookup("ACME.example").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_cached() {
        let inner = Arc::new(MockLookup::empty());
        let cached = CachedLookup::new(inner.clone(), 100, Duration::from_secs(60));

        assert_eq!(cached.lookup("nobody.example").await.unwrap(), None);
        assert_eq!(cached.lookup("nobody.example").await.unwrap(), None);
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(MockLookup::failing());
        let cached = CachedLookup::new(inner.clone(), 100, Duration::from_secs(60));

        assert!(cached.lookup("acme.example").await.is_err());
        assert!(cached.lookup("acme.example").await.is_err());
        assert_eq!(inner.calls(), 2);

        cached.invalidate_all();
    }
}
