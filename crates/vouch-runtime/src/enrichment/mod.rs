//! Enrichment: finding a company representative from the employer's domain.
//!
//! The lookup is best effort. Workflows turn every error into
//! [`EnrichmentOutcome::Failed`](vouch_core::EnrichmentOutcome) and carry on.
//! In production the stack is cache, then circuit guard, then the service.

mod apollo;
mod cache;

pub use apollo::{parse_people_search, APOLLO_API_TOKEN_ENV};
#[cfg(feature = "http")]
pub use apollo::ApolloLookup;
pub use cache::CachedLookup;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use vouch_core::{EnrichmentOutcome, RepresentativeRecord};

use crate::resilience::{CircuitBreaker, Dependency};
use crate::secrets::CredentialError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("Enrichment request failed: {0}")]
    Http(String),

    #[error("Enrichment service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Enrichment response could not be parsed: {0}")]
    Parse(String),

    #[error("Enrichment lookup timed out")]
    Timeout,

    #[error("Circuit open for enrichment, lookup skipped")]
    CircuitOpen,

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Looks up a representative at the organization behind `domain`.
#[async_trait]
pub trait EnrichmentLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError>;
}

/// Run `lookup` and fold the result into an [`EnrichmentOutcome`].
pub async fn enrich(lookup: &dyn EnrichmentLookup, domain: Option<&str>) -> EnrichmentOutcome {
    let Some(domain) = domain else {
        tracing::info!("No employer domain known, skipping enrichment");
        return EnrichmentOutcome::NotAttempted;
    };

    match lookup.lookup(domain).await {
        Ok(Some(record)) => EnrichmentOutcome::Found(record),
        Ok(None) => EnrichmentOutcome::NoneFound,
        Err(e) => EnrichmentOutcome::Failed(e.to_string()),
    }
}

/// Lookup that never finds anyone. Used when no enrichment service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEnrichment;

#[async_trait]
impl EnrichmentLookup for NoEnrichment {
    async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError> {
        tracing::debug!(domain, "Enrichment disabled");
        Ok(None)
    }
}

/// Lookup guarded by the enrichment circuit.
pub struct GuardedLookup {
    inner: Arc<dyn EnrichmentLookup>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedLookup {
    pub fn new(inner: Arc<dyn EnrichmentLookup>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }
}

#[async_trait]
impl EnrichmentLookup for GuardedLookup {
    async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError> {
        if self.breaker.is_open(Dependency::Enrichment) {
            tracing::warn!(domain, "Enrichment circuit open, skipping lookup");
            return Err(EnrichmentError::CircuitOpen);
        }

        match self.inner.lookup(domain).await {
            Ok(found) => {
                self.breaker.record_success(Dependency::Enrichment);
                Ok(found)
            }
            Err(e) => {
                self.breaker.record_failure(Dependency::Enrichment);
                Err(e)
            }
        }
    }
}
