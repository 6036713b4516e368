//! System instructions for extraction calls.
//!
//! The shared base comes first so providers can cache it; the per-document
//! part is short.

use vouch_core::ExtractionSchema;

/// Base instruction shared by every extraction.
pub const BASE_INSTRUCTION: &str = r#"
You read documents submitted during a mortgage application and record what
they state. You copy values as written. You do not infer, correct or
complete missing information.

## Rules
1. Call the provided tool exactly once
2. Fill each field only from the document text
3. If a field is not stated in the document, use null
4. Keep names, dates and amounts in the form the document uses
"#;

const BIRTH_CERTIFICATE_INSTRUCTION: &str = r#"
## Document: birth certificate
Record the day, month and year of birth as separate fields. The day is a
number, the month is the month's name, the year has four digits. Also record
the state and country of birth.
"#;

const EMPLOYMENT_LETTER_INSTRUCTION: &str = r#"
## Document: employment letter
Record the employee, their start date, role and salary, whether they are
currently employed, the employer's name and website, and the details of the
person who signed the letter.
"#;

const BANK_STATEMENT_INSTRUCTION: &str = r#"
## Document: bank statement
Record the account holder, bank, currency, statement period, opening and
closing balances, total credits and debits, and any recurring income such as
salary payments.
"#;

/// Full system instruction for `schema`.
pub fn system_instruction(schema: ExtractionSchema) -> String {
    let specific = match schema {
        ExtractionSchema::BirthCertificate => BIRTH_CERTIFICATE_INSTRUCTION,
        ExtractionSchema::EmploymentLetter => EMPLOYMENT_LETTER_INSTRUCTION,
        ExtractionSchema::BankStatement => BANK_STATEMENT_INSTRUCTION,
    };
    format!("{}{}", BASE_INSTRUCTION.trim_end(), specific)
}
