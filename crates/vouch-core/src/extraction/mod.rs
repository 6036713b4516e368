//! Extraction schemas and typed entity parsing.
//!
//! The extraction call itself lives in the runtime; this module only knows
//! what to ask for and how to read the answer.

mod entities;
mod schema;

pub use entities::{flag_field, text_field, BirthEntities, EmploymentEntities, EntityMap};
pub use schema::{validate_entities, ExtractionSchema, SchemaError};
