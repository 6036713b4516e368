//! Verification records and their single terminal transition.
//!
//! A record is created `pending` and decided at most once. The fields are
//! private so the two invariants cannot be broken from outside:
//! - `verified_at` is set iff `status != pending`
//! - `is_verified` is true iff `status == verified`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar;
use crate::evidence::EmploymentEvidence;

/// Errors from record operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Verification {token} expired at {expired_at}")]
    Expired {
        token: Token,
        expired_at: DateTime<Utc>,
    },

    #[error("Inconsistent record snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Token string was not a 128-bit identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed verification token")]
pub struct TokenParseError;

/// Unguessable identifier of one verification request.
///
/// 128 random bits (UUID v4), rendered as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Token(Uuid);

impl Token {
    /// Draw a fresh token from the OS random source.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0.simple())
    }
}

impl FromStr for Token {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s.trim())
            .map(Token)
            .map_err(|_| TokenParseError)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}

impl TryFrom<String> for Token {
    type Error = TokenParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifecycle status of a verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Verified,
    NotVerified,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Verified => "verified",
            RecordStatus::NotVerified => "not_verified",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RecordStatus::Pending)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Deny,
}

impl Decision {
    pub fn target_status(self) -> RecordStatus {
        match self {
            Decision::Confirm => RecordStatus::Verified,
            Decision::Deny => RecordStatus::NotVerified,
        }
    }

    /// Label relayed to the downstream callback.
    pub fn outcome_label(self) -> &'static str {
        match self {
            Decision::Confirm => "confirmed",
            Decision::Deny => "denied",
        }
    }
}

/// Result of applying a decision to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The record moved from pending to a terminal status
    Applied,
    /// The record was already decided and was left untouched
    AlreadyDecided,
}

/// A verification request awaiting (or holding) a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordSnapshot")]
pub struct VerificationRecord {
    token: Token,
    status: RecordStatus,
    created_at: DateTime<Utc>,
    is_verified: bool,
    verified_at: Option<DateTime<Utc>>,
    verification_data: EmploymentEvidence,
}

impl VerificationRecord {
    /// Create a pending record. This is the only constructor.
    pub fn new(token: Token, evidence: EmploymentEvidence, created_at: DateTime<Utc>) -> Self {
        Self {
            token,
            status: RecordStatus::Pending,
            created_at,
            is_verified: false,
            verified_at: None,
            verification_data: evidence,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        self.verified_at
    }

    pub fn verification_data(&self) -> &EmploymentEvidence {
        &self.verification_data
    }

    pub fn is_decided(&self) -> bool {
        self.verified_at.is_some()
    }

    /// When this record stops accepting decisions, if still pending.
    pub fn expires_at(&self) -> DateTime<Utc> {
        calendar::expires_at(self.created_at)
    }

    /// A decided record never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.verified_at.is_some() {
            return false;
        }
        now > self.expires_at()
    }

    /// Apply a decision. First write wins.
    ///
    /// - decided already: no change, `AlreadyDecided`
    /// - pending but expired: `RecordError::Expired`, no change
    /// - pending: terminal status, `is_verified`, and `verified_at = now`
    pub fn decide(
        &mut self,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, RecordError> {
        if self.is_decided() {
            return Ok(DecisionOutcome::AlreadyDecided);
        }

        if self.is_expired(now) {
            return Err(RecordError::Expired {
                token: self.token,
                expired_at: self.expires_at(),
            });
        }

        self.status = decision.target_status();
        self.is_verified = decision == Decision::Confirm;
        self.verified_at = Some(now);
        Ok(DecisionOutcome::Applied)
    }
}

/// Wire form of a record; validated before it becomes a `VerificationRecord`.
#[derive(Deserialize)]
struct RecordSnapshot {
    token: Token,
    status: RecordStatus,
    created_at: DateTime<Utc>,
    is_verified: bool,
    verified_at: Option<DateTime<Utc>>,
    verification_data: EmploymentEvidence,
}

impl TryFrom<RecordSnapshot> for VerificationRecord {
    type Error = RecordError;

    fn try_from(s: RecordSnapshot) -> Result<Self, Self::Error> {
        if s.status.is_terminal() != s.verified_at.is_some() {
            return Err(RecordError::InvalidSnapshot(format!(
                "status {} with verified_at {:?}",
                s.status, s.verified_at
            )));
        }
        if s.is_verified != (s.status == RecordStatus::Verified) {
            return Err(RecordError::InvalidSnapshot(format!(
                "status {} with is_verified {}",
                s.status, s.is_verified
            )));
        }

        Ok(Self {
            token: s.token,
            status: s.status,
            created_at: s.created_at,
            is_verified: s.is_verified,
            verified_at: s.verified_at,
            verification_data: s.verification_data,
        })
    }
}
