//! Confirmation State Machine.
//!
//! Issues tokens for reconciled evidence and applies the reviewer's single
//! decision. Transitions are atomic per token: the store runs the decision
//! under the record's lock. The callback relay runs on its own task, only for
//! the call that actually moved the record, and never delays the caller.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;
use vouch_core::{
    Decision, DecisionOutcome, EmploymentEvidence, RecordError, RecordStatus, Token,
    VerificationRecord,
};

use crate::clock::Clock;
use crate::notifier::{Notifier, OutcomeNotice};
use crate::store::{RecordStore, StoreError};

/// Format of `verified_at` in status views.
pub const VERIFIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Token not found")]
    NotFound,

    #[error("Verification link expired at {expired_at}")]
    Expired {
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("Record store failed: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TransitionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => TransitionError::NotFound,
            other => TransitionError::Store(other),
        }
    }
}

/// Result of a confirm or deny call.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// This call decided the record
    Applied(VerificationRecord),
    /// An earlier call already decided it; nothing changed
    AlreadyDecided(VerificationRecord),
}

impl Transition {
    pub fn record(&self) -> &VerificationRecord {
        match self {
            Transition::Applied(r) | Transition::AlreadyDecided(r) => r,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Public view of a record's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub token: Token,
    pub status: RecordStatus,
    pub is_verified: bool,
    pub verified_at: Option<String>,
}

impl From<&VerificationRecord> for StatusView {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            token: record.token(),
            status: record.status(),
            is_verified: record.is_verified(),
            verified_at: record
                .verified_at()
                .map(|t| t.format(VERIFIED_AT_FORMAT).to_string()),
        }
    }
}

pub struct ConfirmationStateMachine {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ConfirmationStateMachine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Create a pending record for `evidence` and return its token.
    #[tracing::instrument(skip_all)]
    pub async fn issue(&self, evidence: EmploymentEvidence) -> Result<Token, StoreError> {
        let token = Token::generate();
        let record = VerificationRecord::new(token, evidence, self.clock.now());
        self.store.insert(record).await?;
        tracing::info!(%token, "Verification record issued");
        Ok(token)
    }

    pub async fn confirm(&self, token: &Token) -> Result<Transition, TransitionError> {
        self.decide(token, Decision::Confirm).await
    }

    pub async fn deny(&self, token: &Token) -> Result<Transition, TransitionError> {
        self.decide(token, Decision::Deny).await
    }

    #[tracing::instrument(skip(self, token), fields(token = %token))]
    async fn decide(&self, token: &Token, decision: Decision) -> Result<Transition, TransitionError> {
        let now = self.clock.now();
        let (record, outcome) = self
            .store
            .update(token, Box::new(move |r| r.decide(decision, now)))
            .await?;

        match outcome {
            Ok(DecisionOutcome::Applied) => {
                tracing::info!(status = %record.status(), "Verification decided");
                self.relay(decision, *token);
                Ok(Transition::Applied(record))
            }
            Ok(DecisionOutcome::AlreadyDecided) => {
                tracing::info!(
                    status = %record.status(),
                    requested = decision.outcome_label(),
                    "Verification already decided, ignoring"
                );
                Ok(Transition::AlreadyDecided(record))
            }
            Err(RecordError::Expired { expired_at, .. }) => {
                tracing::warn!(%expired_at, "Decision on expired verification rejected");
                Err(TransitionError::Expired { expired_at })
            }
            Err(RecordError::InvalidSnapshot(reason)) => {
                Err(TransitionError::Store(StoreError::Backend(reason)))
            }
        }
    }

    /// Send the outcome downstream on a detached task.
    fn relay(&self, decision: Decision, token: Token) {
        let notifier = Arc::clone(&self.notifier);
        let notice = OutcomeNotice::new(decision, token);
        let span = tracing::info_span!("relay_outcome", %token, status = notice.status);

        tokio::spawn(
            async move {
                match notifier.relay_outcome(&notice).await {
                    Ok(()) => tracing::debug!("Verification outcome relayed"),
                    Err(e) => tracing::error!(error = %e, "Failed to relay verification outcome"),
                }
            }
            .instrument(span),
        );
    }

    pub async fn status(&self, token: &Token) -> Result<StatusView, TransitionError> {
        let record = self
            .store
            .get(token)
            .await?
            .ok_or(TransitionError::NotFound)?;
        Ok(StatusView::from(&record))
    }

    /// Full record, for callers that need the stored evidence.
    pub async fn record(&self, token: &Token) -> Result<VerificationRecord, TransitionError> {
        self.store
            .get(token)
            .await?
            .ok_or(TransitionError::NotFound)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
