//! Evidence payloads and the Reconciler that builds them.
//!
//! A payload always carries the primary document's view. Secondary sources
//! are added when they found something, and a payload with nothing at all
//! says so explicitly instead of carrying an empty structure.

mod payload;
mod reconciler;

pub use payload::{
    BirthEvidence, DocumentRepresentative, EmploymentEvidence, EnrichmentOutcome, PhoneNumber,
    RepresentativeRecord, SourceMap, Sources, NO_SOURCE_FOUND,
};
pub use reconciler::{birth_date, Reconciler};
