//! Evidence Reconciler: merges extraction output with enrichment output.
//!
//! Rules, in order:
//! 1. `primary_document` is always built from the letter, field by field
//! 2. `enrichment_lookup` is added only for `EnrichmentOutcome::Found`
//! 3. A failed lookup is logged and treated as "none found"
//! 4. If no entry carries any value, `sources` becomes the sentinel

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::calendar::{age_on, parse_month};
use crate::extraction::{BirthEntities, EmploymentEntities};

use super::payload::{
    BirthEvidence, DocumentRepresentative, EmploymentEvidence, EnrichmentOutcome, PhoneNumber,
    RepresentativeRecord, SourceMap, Sources,
};

lazy_static! {
    /// Day of month, optionally with an English ordinal suffix ("15th")
    static ref DAY_PATTERN: Regex = Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?$").unwrap();

    /// Four-digit year
    static ref YEAR_PATTERN: Regex = Regex::new(r"^(\d{4})$").unwrap();
}

/// The Reconciler builds canonical evidence payloads.
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// Merge letter entities with the enrichment outcome.
    ///
    /// Never fails: a missing field stays `None`, and an enrichment failure
    /// only costs the `enrichment_lookup` entry.
    pub fn reconcile(
        &self,
        entities: &EmploymentEntities,
        enrichment: EnrichmentOutcome,
    ) -> EmploymentEvidence {
        let primary = DocumentRepresentative {
            representative: entities.representative.clone(),
            representative_position: entities.representative_position.clone(),
            representative_email: entities.representative_email.clone(),
            representative_phone_number: entities.representative_phone_number.clone(),
        };

        let enrichment_lookup = match enrichment {
            EnrichmentOutcome::Found(record) => Some(normalize_record(record)),
            EnrichmentOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "Enrichment lookup failed, continuing without it");
                None
            }
            EnrichmentOutcome::NotAttempted | EnrichmentOutcome::NoneFound => None,
        };

        let map = SourceMap {
            primary_document: Some(primary),
            enrichment_lookup,
        };

        let sources = if map.is_empty() {
            tracing::info!("No corroborating source found for employment evidence");
            Sources::NoneFound
        } else {
            Sources::Collected(map)
        };

        EmploymentEvidence {
            employee_name: entities.employee_name.clone(),
            employment_date: entities.start_date.clone(),
            current_staff: entities.current_staff,
            job_role: entities.job_role.clone(),
            salary: entities.salary.clone(),
            company_name: entities.company_name.clone(),
            company_website: entities.company_website.clone(),
            sources,
        }
    }

    /// Attach the computed age to birth certificate entities.
    pub fn reconcile_birth(&self, entities: BirthEntities, today: NaiveDate) -> BirthEvidence {
        let age = match birth_date(&entities) {
            Some(birth) => {
                let years = age_on(birth, today);
                if years < 0 {
                    tracing::warn!(%birth, %today, "Birth date lies in the future");
                    None
                } else {
                    Some(years as u32)
                }
            }
            None => {
                tracing::warn!(
                    day = ?entities.birth_date,
                    month = ?entities.birth_month,
                    year = ?entities.birth_year,
                    "Birth date could not be read, age left empty"
                );
                None
            }
        };

        BirthEvidence { entities, age }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a calendar date from extracted day, month-name and year parts.
///
/// Returns `None` when any part is missing, unreadable, or the combination
/// does not exist (e.g. 31 February).
pub fn birth_date(entities: &BirthEntities) -> Option<NaiveDate> {
    let day: u32 = DAY_PATTERN
        .captures(entities.birth_date.as_deref()?.trim())?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let month = parse_month(entities.birth_month.as_deref()?)?;
    let year: i32 = YEAR_PATTERN
        .captures(entities.birth_year.as_deref()?.trim())?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_record(record: RepresentativeRecord) -> RepresentativeRecord {
    RepresentativeRecord {
        first_name: clean(record.first_name),
        last_name: clean(record.last_name),
        full_name: clean(record.full_name),
        linkedin_url: clean(record.linkedin_url),
        title: clean(record.title),
        email: clean(record.email).map(|e| e.to_ascii_lowercase()),
        organization_name: clean(record.organization_name),
        organization_website_url: clean(record.organization_website_url),
        organization_phone: clean(record.organization_phone),
        organization_primary_phone: record.organization_primary_phone.map(|p| PhoneNumber {
            number: clean(p.number),
            source: clean(p.source),
        }),
    }
}
