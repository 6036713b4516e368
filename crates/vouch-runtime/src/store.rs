//! Verification record storage.
//!
//! The map lock is only held to find or insert a record's slot. Updates run
//! under that record's own lock, so two decisions on one token serialize
//! while decisions on different tokens never wait on each other.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use vouch_core::{DecisionOutcome, RecordError, Token, VerificationRecord};

/// Mutation applied to a single record under its lock.
pub type RecordUpdate =
    Box<dyn FnOnce(&mut VerificationRecord) -> Result<DecisionOutcome, RecordError> + Send>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record {0} already exists")]
    Duplicate(Token),

    #[error("Record {0} not found")]
    NotFound(Token),

    #[error("Storage backend failed: {0}")]
    Backend(String),
}

/// Persistence seam for verification records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Never overwrites.
    async fn insert(&self, record: VerificationRecord) -> Result<(), StoreError>;

    async fn get(&self, token: &Token) -> Result<Option<VerificationRecord>, StoreError>;

    /// Run `apply` on the record under its lock and return the updated copy
    /// together with what `apply` returned.
    async fn update(
        &self,
        token: &Token,
        apply: RecordUpdate,
    ) -> Result<(VerificationRecord, Result<DecisionOutcome, RecordError>), StoreError>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Token, Arc<Mutex<VerificationRecord>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn slot(&self, token: &Token) -> Option<Arc<Mutex<VerificationRecord>>> {
        self.records.read().get(token).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, record: VerificationRecord) -> Result<(), StoreError> {
        let token = record.token();
        let mut records = self.records.write();
        if records.contains_key(&token) {
            return Err(StoreError::Duplicate(token));
        }
        records.insert(token, Arc::new(Mutex::new(record)));
        Ok(())
    }

    async fn get(&self, token: &Token) -> Result<Option<VerificationRecord>, StoreError> {
        Ok(self.slot(token).map(|slot| slot.lock().clone()))
    }

    async fn update(
        &self,
        token: &Token,
        apply: RecordUpdate,
    ) -> Result<(VerificationRecord, Result<DecisionOutcome, RecordError>), StoreError> {
        let slot = self.slot(token).ok_or(StoreError::NotFound(*token))?;
        let mut record = slot.lock();
        let result = apply(&mut record);
        Ok((record.clone(), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vouch_core::{Decision, EmploymentEvidence, RecordStatus, Sources};

    fn record(token: Token) -> VerificationRecord {
        let evidence = EmploymentEvidence {
            employee_name: None,
            employment_date: None,
            current_staff: None,
            job_role: None,
            salary: None,
            company_name: None,
            company_website: None,
            sources: Sources::NoneFound,
        };
        VerificationRecord::new(token, evidence, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        let token = Token::generate();
        store.insert(record(token)).await.unwrap();

        let fetched = store.get(&token).await.unwrap().unwrap();
        assert_eq!(fetched.token(), token);
        assert!(store.get(&Token::generate()).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryStore::new();
        let token = Token::generate();
        store.insert(record(token)).await.unwrap();
        assert_eq!(
            store.insert(record(token)).await,
            Err(StoreError::Duplicate(token))
        );
    }

    #[tokio::test]
    async fn test_update_missing_token() {
        let store = InMemoryStore::new();
        let token = Token::generate();
        let result = store
            .update(&token, Box::new(|_| Ok(DecisionOutcome::AlreadyDecided)))
            .await;
        assert_eq!(result.unwrap_err(), StoreError::NotFound(token));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_apply_once() {
        let store = Arc::new(InMemoryStore::new());
        let token = Token::generate();
        store.insert(record(token)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let decision = if i % 2 == 0 { Decision::Confirm } else { Decision::Deny };
            handles.push(tokio::spawn(async move {
                store
                    .update(&token, Box::new(move |r| r.decide(decision, Utc::now())))
                    .await
                    .unwrap()
                    .1
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() == Ok(DecisionOutcome::Applied) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);

        let stored = store.get(&token).await.unwrap().unwrap();
        assert_ne!(stored.status(), RecordStatus::Pending);
    }
}
