//! Shared value types for documents and dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A tier value outside the supported set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unsupported document category: {0}")]
pub struct UnsupportedCategory(pub i64);

/// Classified analysis cost of a document.
///
/// Tiers 1 and 2 are cheap enough to answer inline; tier 3 is shed to the
/// background lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Tier {
    Basic = 1,
    Standard = 2,
    Extended = 3,
}

impl Tier {
    /// Whether the dispatcher should block on the result.
    pub fn is_synchronous(self) -> bool {
        matches!(self, Tier::Basic | Tier::Standard)
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Tier {
    type Error = UnsupportedCategory;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Tier::Basic),
            2 => Ok(Tier::Standard),
            3 => Ok(Tier::Extended),
            other => Err(UnsupportedCategory(other)),
        }
    }
}

impl From<Tier> for i64 {
    fn from(tier: Tier) -> Self {
        tier.as_i64()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// A document as handed over by the document source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Identifier the caller used
    pub id: String,

    /// Fetchable content URL
    pub url: String,

    /// File extension, if known (e.g. "pdf")
    #[serde(default)]
    pub extension: Option<String>,

    /// Raw, possibly escaped JSON blob of extra properties
    #[serde(default)]
    pub extra_properties: Option<String>,
}

/// Output of the classification collaborator, before tier validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: i64,
    pub url: String,
}

/// A validated unit of analysis work. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub document_id: String,
    pub tier: Tier,
    pub url: String,
}

impl JobDescriptor {
    /// Validate a raw classification into a job.
    pub fn from_classification(
        document_id: impl Into<String>,
        classification: Classification,
    ) -> Result<Self, UnsupportedCategory> {
        Ok(Self {
            document_id: document_id.into(),
            tier: Tier::try_from(classification.tier)?,
            url: classification.url,
        })
    }
}

/// Provenance tags for evidence sources. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// The uploaded document itself
    PrimaryDocument,
    /// The third-party enrichment lookup
    EnrichmentLookup,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::PrimaryDocument => "primary_document",
            SourceTag::EnrichmentLookup => "enrichment_lookup",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
