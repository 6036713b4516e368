//! # vouch-runtime
//!
//! The async side of Vouch: everything that waits on a network, a clock or
//! another task.
//!
//! - [`TaskDispatcher`] routes documents to the inline or background lane
//! - [`ConfirmationStateMachine`] issues tokens and applies reviewer decisions
//! - [`VerificationWorkflow`] runs the age and employment checks end to end
//!
//! Deterministic rules (records, expiry, reconciliation, schemas) live in
//! `vouch-core`; this crate wires them to collaborators behind traits so every
//! external service can be swapped for an in-memory one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vouch_runtime::{
//!     ConfirmationStateMachine, InMemoryStore, RuntimeConfig, SystemClock, TracingNotifier,
//! };
//!
//! let config = RuntimeConfig::from_yaml_file("vouch.yaml")?.with_env();
//! let notifier = Arc::new(TracingNotifier);
//! let machine = ConfirmationStateMachine::new(
//!     Arc::new(InMemoryStore::new()),
//!     notifier,
//!     Arc::new(SystemClock),
//! );
//!
//! let token = machine.issue(evidence).await?;
//! machine.confirm(&token).await?;
//! ```
//!
//! ## Features
//!
//! - `anthropic`: the Anthropic extraction provider
//! - `http`: HTTP document service, Apollo enrichment and webhook notifier

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod documents;
pub mod enrichment;
pub mod extraction;
pub mod machine;
pub mod notifier;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod secrets;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RuntimeConfig};
pub use dispatcher::{
    AnalysisError, BackgroundExecutor, DispatchError, DispatchOutcome, DocumentAnalyzer,
    JobHandle, QueueFull, StatementAnalyzer, TaskDispatcher, TokioExecutor, DEFERRED_MESSAGE,
};
pub use documents::{
    Classifier, DocumentError, DocumentSource, InMemoryDocuments, StoredDocument, TextLoader,
};
pub use enrichment::{
    CachedLookup, EnrichmentError, EnrichmentLookup, GuardedLookup, NoEnrichment,
};
pub use extraction::{ExtractionError, ExtractionService, LlmExtractor};
pub use machine::{ConfirmationStateMachine, StatusView, Transition, TransitionError};
pub use notifier::{
    ConfirmationRequest, GuardedNotifier, Notifier, NotifyError, OutcomeNotice, TracingNotifier,
};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use store::{InMemoryStore, RecordStore, StoreError};
pub use workflow::{EmploymentReport, VerificationWorkflow, WorkflowError};

#[cfg(feature = "http")]
pub use documents::{HttpDocumentService, HttpTextLoader};
#[cfg(feature = "http")]
pub use enrichment::ApolloLookup;
#[cfg(feature = "http")]
pub use notifier::WebhookNotifier;
