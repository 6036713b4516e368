//! Test doubles shared by the runtime's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use vouch_core::{
    DocumentRepresentative, EmploymentEvidence, EntityMap, ExtractionSchema, RepresentativeRecord,
    SourceMap, Sources,
};

use crate::enrichment::{EnrichmentError, EnrichmentLookup};
use crate::extraction::{checked_entities, ExtractionError, ExtractionService};
use crate::notifier::{ConfirmationRequest, Notifier, NotifyError, OutcomeNotice};
use crate::providers::ProviderError;

pub fn sample_evidence() -> EmploymentEvidence {
    EmploymentEvidence {
        employee_name: Some("Ada Obi".into()),
        employment_date: Some("1 March 2019".into()),
        current_staff: Some(true),
        job_role: Some("Analyst".into()),
        salary: Some("NGN 4,800,000".into()),
        company_name: Some("Acme Ltd".into()),
        company_website: Some("https://acme.example".into()),
        sources: Sources::Collected(SourceMap {
            primary_document: Some(DocumentRepresentative {
                representative: Some("John Bello".into()),
                representative_position: Some("Head of People".into()),
                representative_email: None,
                representative_phone_number: None,
            }),
            enrichment_lookup: Some(RepresentativeRecord {
                full_name: Some("Grace Eze".into()),
                email: Some("grace@acme.example".into()),
                ..Default::default()
            }),
        }),
    }
}

/// Notifier that remembers everything it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    requests: Mutex<Vec<ConfirmationRequest>>,
    outcomes: Mutex<Vec<OutcomeNotice>>,
}

impl RecordingNotifier {
    /// Records calls, then reports every send as rejected.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        self.requests.lock().clone()
    }

    pub fn outcomes(&self) -> Vec<OutcomeNotice> {
        self.outcomes.lock().clone()
    }

    /// Yield until `count` outcomes were relayed. Relays run on their own task.
    pub async fn wait_for_outcomes(&self, count: usize) -> Vec<OutcomeNotice> {
        for _ in 0..1000 {
            let outcomes = self.outcomes();
            if outcomes.len() >= count {
                return outcomes;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} relayed outcomes, got {}", self.outcomes().len());
    }

    fn result(&self) -> Result<(), NotifyError> {
        if self.fail {
            Err(NotifyError::Rejected { status: 502 })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<(), NotifyError> {
        self.requests.lock().push(request.clone());
        self.result()
    }

    async fn relay_outcome(&self, notice: &OutcomeNotice) -> Result<(), NotifyError> {
        self.outcomes.lock().push(notice.clone());
        self.result()
    }
}

/// Extractor with canned, schema-checked output per schema.
#[derive(Default)]
pub struct MockExtractor {
    outputs: HashMap<ExtractionSchema, JsonValue>,
    texts: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, schema: ExtractionSchema, output: JsonValue) -> Self {
        self.outputs.insert(schema, output);
        self
    }

    /// Texts passed to `extract`, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

#[async_trait]
impl ExtractionService for MockExtractor {
    async fn extract(
        &self,
        schema: ExtractionSchema,
        text: &str,
    ) -> Result<EntityMap, ExtractionError> {
        self.texts.lock().push(text.to_string());
        let output = self.outputs.get(&schema).cloned().ok_or_else(|| {
            ExtractionError::Provider(ProviderError::MissingToolCall(
                schema.function_name().to_string(),
            ))
        })?;
        checked_entities(schema, output)
    }
}

enum LookupReply {
    Found(RepresentativeRecord),
    Empty,
    Failing,
}

/// Enrichment lookup with a fixed reply.
pub struct MockLookup {
    reply: LookupReply,
    domains: Mutex<Vec<String>>,
}

impl MockLookup {
    fn with_reply(reply: LookupReply) -> Self {
        Self {
            reply,
            domains: Mutex::new(Vec::new()),
        }
    }

    pub fn found(email: &str) -> Self {
        Self::with_reply(LookupReply::Found(RepresentativeRecord {
            first_name: Some("Grace".into()),
            last_name: Some("Eze".into()),
            full_name: Some("Grace Eze".into()),
            title: Some("HR Manager".into()),
            email: Some(email.to_string()),
            organization_name: Some("Acme Ltd".into()),
            ..Default::default()
        }))
    }

    pub fn empty() -> Self {
        Self::with_reply(LookupReply::Empty)
    }

    /// Fails every lookup with HTTP 503.
    pub fn failing() -> Self {
        Self::with_reply(LookupReply::Failing)
    }

    pub fn calls(&self) -> usize {
        self.domains.lock().len()
    }

    pub fn domains(&self) -> Vec<String> {
        self.domains.lock().clone()
    }
}

#[async_trait]
impl EnrichmentLookup for MockLookup {
    async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError> {
        self.domains.lock().push(domain.to_string());
        match &self.reply {
            LookupReply::Found(record) => Ok(Some(record.clone())),
            LookupReply::Empty => Ok(None),
            LookupReply::Failing => Err(EnrichmentError::Status { status: 503 }),
        }
    }
}
