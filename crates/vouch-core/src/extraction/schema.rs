//! Extraction schemas and JSON Schema validation of extraction output.
//!
//! Each document kind has a parameters schema under `schemas/`. The same
//! schema is handed to the extraction service as the function signature and
//! used here to validate what comes back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

const BIRTH_CERTIFICATE_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/birth_certificate.schema.json");
const EMPLOYMENT_LETTER_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/employment_letter.schema.json");
const BANK_STATEMENT_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/bank_statement.schema.json");

type Compiled = OnceLock<Result<jsonschema::Validator, String>>;

static BIRTH_CERTIFICATE: Compiled = OnceLock::new();
static EMPLOYMENT_LETTER: Compiled = OnceLock::new();
static BANK_STATEMENT: Compiled = OnceLock::new();

/// Errors from schema handling.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("Failed to load schema {schema}: {reason}")]
    LoadError { schema: ExtractionSchema, reason: String },
}

/// The document kinds the extraction service is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSchema {
    BirthCertificate,
    EmploymentLetter,
    BankStatement,
}

impl ExtractionSchema {
    /// Function name the extraction service is forced to call.
    pub fn function_name(self) -> &'static str {
        match self {
            ExtractionSchema::BirthCertificate => "get_birth_certificate_entities",
            ExtractionSchema::EmploymentLetter => "get_employment_letter_entities",
            ExtractionSchema::BankStatement => "get_bank_statement_entities",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExtractionSchema::BirthCertificate => {
                "Extracts specified entities from the provided birth certificate content. \
                 If an entity is not found, return null for that entity."
            }
            ExtractionSchema::EmploymentLetter => {
                "Extracts specified entities from the provided employment letter content. \
                 If an entity is not found, return null for that entity."
            }
            ExtractionSchema::BankStatement => {
                "Extracts summary figures from the provided bank statement content. \
                 If a figure is not found, return null for that entity."
            }
        }
    }

    fn raw(self) -> &'static str {
        match self {
            ExtractionSchema::BirthCertificate => BIRTH_CERTIFICATE_SCHEMA_JSON,
            ExtractionSchema::EmploymentLetter => EMPLOYMENT_LETTER_SCHEMA_JSON,
            ExtractionSchema::BankStatement => BANK_STATEMENT_SCHEMA_JSON,
        }
    }

    fn cell(self) -> &'static Compiled {
        match self {
            ExtractionSchema::BirthCertificate => &BIRTH_CERTIFICATE,
            ExtractionSchema::EmploymentLetter => &EMPLOYMENT_LETTER,
            ExtractionSchema::BankStatement => &BANK_STATEMENT,
        }
    }

    /// The parameters schema as JSON, for building the tool definition.
    pub fn parameters(self) -> Result<serde_json::Value, SchemaError> {
        serde_json::from_str(self.raw()).map_err(|e| SchemaError::LoadError {
            schema: self,
            reason: format!("Invalid schema JSON: {}", e),
        })
    }

    /// Property names declared by the schema.
    pub fn fields(self) -> Vec<String> {
        self.parameters()
            .ok()
            .and_then(|v| {
                v["properties"]
                    .as_object()
                    .map(|props| props.keys().cloned().collect())
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for ExtractionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Get or initialize the compiled validator for a schema.
fn get_validator(schema: ExtractionSchema) -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = schema.cell().get_or_init(|| {
        let value = schema.parameters().map_err(|e| e.to_string())?;
        jsonschema::options()
            .build(&value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    match result {
        Ok(v) => Ok(v),
        Err(reason) => Err(SchemaError::LoadError {
            schema,
            reason: reason.clone(),
        }),
    }
}

/// Validate extraction output against its schema.
///
/// Returns every violation found, each with its instance path.
pub fn validate_entities(
    schema: ExtractionSchema,
    entities: &serde_json::Value,
) -> Result<(), Vec<String>> {
    let validator = get_validator(schema).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(entities)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ExtractionSchema; 3] = [
        ExtractionSchema::BirthCertificate,
        ExtractionSchema::EmploymentLetter,
        ExtractionSchema::BankStatement,
    ];

    #[test]
    fn test_all_schemas_compile() {
        for schema in ALL {
            assert!(get_validator(schema).is_ok(), "{} failed to compile", schema);
            assert!(!schema.fields().is_empty());
        }
    }

    #[test]
    fn test_birth_certificate_fields() {
        let fields = ExtractionSchema::BirthCertificate.fields();
        for expected in ["birth_date", "birth_month", "birth_year", "birth_state", "birth_country"] {
            assert!(fields.iter().any(|f| f == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_partial_output_is_valid() {
        let value = serde_json::json!({
            "company_name": "Acme Ltd",
            "salary": 250000,
            "current_staff": true,
            "job_role": null
        });
        assert!(validate_entities(ExtractionSchema::EmploymentLetter, &value).is_ok());
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let value = serde_json::json!({ "company_name": ["Acme", "Ltd"] });
        let errors = validate_entities(ExtractionSchema::EmploymentLetter, &value).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("company_name"));
    }

    #[test]
    fn test_non_object_output_fails() {
        let value = serde_json::json!("March 15, 2000");
        assert!(validate_entities(ExtractionSchema::BirthCertificate, &value).is_err());
    }

    #[test]
    fn test_function_names() {
        assert_eq!(
            ExtractionSchema::EmploymentLetter.function_name(),
            "get_employment_letter_entities"
        );
        assert_eq!(
            serde_json::to_string(&ExtractionSchema::BankStatement).unwrap(),
            "\"bank_statement\""
        );
    }
}
