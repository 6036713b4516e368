//! The reconciled evidence payload stored on a verification record.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::extraction::BirthEntities;
use crate::types::SourceTag;

/// Stored in place of `sources` when no entry carries any data.
pub const NO_SOURCE_FOUND: &str =
    "We could not find any source to verify the applicant\u{2019}s employment";

/// Signatory details as they appear on the uploaded letter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRepresentative {
    pub representative: Option<String>,
    pub representative_position: Option<String>,
    pub representative_email: Option<String>,
    pub representative_phone_number: Option<String>,
}

impl DocumentRepresentative {
    pub fn is_empty(&self) -> bool {
        self.representative.is_none()
            && self.representative_position.is_none()
            && self.representative_email.is_none()
            && self.representative_phone_number.is_none()
    }
}

/// A phone number with the provenance the lookup reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: Option<String>,
    pub source: Option<String>,
}

/// A representative found by the enrichment lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub linkedin_url: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub organization_name: Option<String>,
    pub organization_website_url: Option<String>,
    pub organization_phone: Option<String>,
    pub organization_primary_phone: Option<PhoneNumber>,
}

impl RepresentativeRecord {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.full_name.is_none()
            && self.linkedin_url.is_none()
            && self.title.is_none()
            && self.email.is_none()
            && self.organization_name.is_none()
            && self.organization_website_url.is_none()
            && self.organization_phone.is_none()
            && self
                .organization_primary_phone
                .as_ref()
                .map_or(true, |p| p.number.is_none())
    }
}

/// Evidence entries keyed by provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_document: Option<DocumentRepresentative>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_lookup: Option<RepresentativeRecord>,
}

impl SourceMap {
    /// Tags of entries that carry at least one value.
    pub fn populated(&self) -> Vec<SourceTag> {
        let mut tags = Vec::new();
        if self.primary_document.as_ref().is_some_and(|d| !d.is_empty()) {
            tags.push(SourceTag::PrimaryDocument);
        }
        if self.enrichment_lookup.as_ref().is_some_and(|r| !r.is_empty()) {
            tags.push(SourceTag::EnrichmentLookup);
        }
        tags
    }

    pub fn is_empty(&self) -> bool {
        self.populated().is_empty()
    }
}

/// Either the collected sources or the explicit "nothing found" marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Sources {
    Collected(SourceMap),
    NoneFound,
}

impl Sources {
    pub fn as_map(&self) -> Option<&SourceMap> {
        match self {
            Sources::Collected(map) => Some(map),
            Sources::NoneFound => None,
        }
    }

    pub fn is_none_found(&self) -> bool {
        matches!(self, Sources::NoneFound)
    }
}

impl Serialize for Sources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Sources::Collected(map) => map.serialize(serializer),
            Sources::NoneFound => serializer.serialize_str(NO_SOURCE_FOUND),
        }
    }
}

impl<'de> Deserialize<'de> for Sources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Map(SourceMap),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(_) => Sources::NoneFound,
            Repr::Map(map) => Sources::Collected(map),
        })
    }
}

/// Reconciled employment evidence. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentEvidence {
    pub employee_name: Option<String>,
    pub employment_date: Option<String>,
    pub current_staff: Option<bool>,
    pub job_role: Option<String>,
    pub salary: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub sources: Sources,
}

impl EmploymentEvidence {
    /// Address to send a confirmation request to.
    ///
    /// Only an independently found representative qualifies; the signatory
    /// named in the letter is never used as the reviewer.
    pub fn reviewer_email(&self) -> Option<&str> {
        let map = self.sources.as_map()?;
        map.enrichment_lookup
            .as_ref()
            .and_then(|r| r.email.as_deref())
    }
}

/// Birth certificate entities with the computed age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthEvidence {
    #[serde(flatten)]
    pub entities: BirthEntities,

    /// Completed years as of the caller's date; `None` if the birth date
    /// could not be read.
    pub age: Option<u32>,
}

/// What happened when the enrichment lookup was consulted.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// No organization identifier was available
    NotAttempted,
    /// The lookup ran and found nobody
    NoneFound,
    Found(RepresentativeRecord),
    /// The lookup errored; treated exactly like `NoneFound`
    Failed(String),
}
