//! # vouch-core
//!
//! Deterministic building blocks of the Vouch verification engine.
//!
//! This crate owns everything that can be decided without I/O:
//! - the verification record and its single terminal transition
//! - business-day expiry and age arithmetic
//! - extraction schemas and typed entity parsing
//! - reconciliation of extracted and enriched evidence
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: no network, no clock reads; callers pass `now`/`today`
//! 2. **Single decision**: a record leaves `pending` exactly once
//! 3. **Explicit absence**: evidence with no source says so in its payload
//!
//! ## Example
//!
//! ```rust,ignore
//! use vouch_core::{Decision, EnrichmentOutcome, Reconciler, Token, VerificationRecord};
//!
//! let evidence = Reconciler::new().reconcile(&entities, EnrichmentOutcome::NoneFound);
//! let mut record = VerificationRecord::new(Token::generate(), evidence, now);
//! record.decide(Decision::Confirm, now)?;
//! ```

pub mod calendar;
pub mod evidence;
pub mod extraction;
pub mod metadata;
pub mod record;
pub mod types;

// Re-export main types at crate root
pub use calendar::{add_business_days, age_on, expires_at, EXPIRY_BUSINESS_DAYS};
pub use evidence::{
    BirthEvidence, DocumentRepresentative, EmploymentEvidence, EnrichmentOutcome, PhoneNumber,
    Reconciler, RepresentativeRecord, SourceMap, Sources, NO_SOURCE_FOUND,
};
pub use extraction::{
    validate_entities, BirthEntities, EmploymentEntities, EntityMap, ExtractionSchema, SchemaError,
};
pub use record::{
    Decision, DecisionOutcome, RecordError, RecordStatus, Token, TokenParseError,
    VerificationRecord,
};
pub use types::{
    Classification, DocumentRef, JobDescriptor, SourceTag, Tier, UnsupportedCategory,
};
