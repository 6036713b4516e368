//! Typed views over schema-less extraction output.
//!
//! The extraction service answers with a flat JSON object. This is the only
//! place that reads it by key; everything downstream works on the typed
//! structs below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw extraction output, exactly as received.
pub type EntityMap = serde_json::Map<String, Value>;

/// Placeholder strings the extraction service uses for "not found".
const NULLISH: [&str; 5] = ["none", "null", "n/a", "not available", "not found"];

/// Read a field as trimmed text. Numbers are stringified; placeholders and
/// blanks become `None`.
pub fn text_field(map: &EntityMap, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || NULLISH.contains(&trimmed.to_ascii_lowercase().as_str()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a yes/no field. Accepts booleans and common textual forms.
pub fn flag_field(map: &EntityMap, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "current" | "currently employed" => Some(true),
            "false" | "no" | "n" | "former" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Entities read from an employment letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmploymentEntities {
    pub employee_name: Option<String>,
    pub start_date: Option<String>,
    pub current_staff: Option<bool>,
    pub job_role: Option<String>,
    pub salary: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub representative: Option<String>,
    pub representative_position: Option<String>,
    pub representative_email: Option<String>,
    pub representative_phone_number: Option<String>,
}

impl EmploymentEntities {
    pub fn from_map(map: &EntityMap) -> Self {
        Self {
            employee_name: text_field(map, "employee_name"),
            start_date: text_field(map, "start_date"),
            current_staff: flag_field(map, "current_staff"),
            job_role: text_field(map, "job_role"),
            salary: text_field(map, "salary"),
            company_name: text_field(map, "company_name"),
            company_website: text_field(map, "company_website"),
            representative: text_field(map, "representative"),
            representative_position: text_field(map, "representative_position"),
            representative_email: text_field(map, "representative_email"),
            representative_phone_number: text_field(map, "representative_phone_number"),
        }
    }
}

/// Entities read from a birth certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BirthEntities {
    pub birth_date: Option<String>,
    pub birth_month: Option<String>,
    pub birth_year: Option<String>,
    pub birth_state: Option<String>,
    pub birth_country: Option<String>,
}

impl BirthEntities {
    pub fn from_map(map: &EntityMap) -> Self {
        Self {
            birth_date: text_field(map, "birth_date"),
            birth_month: text_field(map, "birth_month"),
            birth_year: text_field(map, "birth_year"),
            birth_state: text_field(map, "birth_state"),
            birth_country: text_field(map, "birth_country"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> EntityMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_placeholders_become_none() {
        let m = map(json!({
            "job_role": "None",
            "salary": "  ",
            "company_name": "N/A",
            "start_date": null
        }));
        let e = EmploymentEntities::from_map(&m);
        assert_eq!(e.job_role, None);
        assert_eq!(e.salary, None);
        assert_eq!(e.company_name, None);
        assert_eq!(e.start_date, None);
    }

    #[test]
    fn test_numbers_are_stringified() {
        let m = map(json!({ "salary": 250000, "birth_year": 2000 }));
        assert_eq!(text_field(&m, "salary").as_deref(), Some("250000"));
        assert_eq!(BirthEntities::from_map(&m).birth_year.as_deref(), Some("2000"));
    }

    #[test]
    fn test_flag_forms() {
        let m = map(json!({ "a": true, "b": "Yes", "c": "no", "d": "maybe" }));
        assert_eq!(flag_field(&m, "a"), Some(true));
        assert_eq!(flag_field(&m, "b"), Some(true));
        assert_eq!(flag_field(&m, "c"), Some(false));
        assert_eq!(flag_field(&m, "d"), None);
        assert_eq!(flag_field(&m, "missing"), None);
    }

    #[test]
    fn test_employment_entities_full() {
        let m = map(json!({
            "employee_name": "Ada Obi",
            "start_date": "2019-02-01",
            "current_staff": "true",
            "job_role": "Analyst",
            "company_name": "Acme Ltd",
            "representative": "Jane Roe",
            "representative_email": "jane@acme.example"
        }));
        let e = EmploymentEntities::from_map(&m);
        assert_eq!(e.employee_name.as_deref(), Some("Ada Obi"));
        assert_eq!(e.current_staff, Some(true));
        assert_eq!(e.representative_email.as_deref(), Some("jane@acme.example"));
        assert_eq!(e.representative_phone_number, None);
    }
}
