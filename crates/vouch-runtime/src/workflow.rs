//! Verification workflows.
//!
//! Composes the collaborators into the two request paths:
//!
//! - **Age**: document → text → birth-certificate extraction → age
//! - **Employment**: document → text → letter extraction → employer domain
//!   → enrichment → reconciliation → token → reviewer notification
//!
//! Extraction failures end the request. Enrichment and notification failures
//! do not: the record is still issued.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use vouch_core::metadata::{extract_domain, organization_website, parse_extra_properties};
use vouch_core::{
    BirthEntities, BirthEvidence, DocumentRef, EmploymentEntities, EmploymentEvidence,
    ExtractionSchema, Reconciler, Token,
};

use crate::documents::{DocumentError, DocumentSource, TextLoader};
use crate::enrichment::{enrich, EnrichmentLookup, NoEnrichment};
use crate::extraction::{ExtractionError, ExtractionService};
use crate::machine::ConfirmationStateMachine;
use crate::notifier::{ConfirmationRequest, Notifier};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Document unavailable: {0}")]
    Document(#[from] DocumentError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Could not issue verification record: {0}")]
    Store(#[from] StoreError),

    #[error("Workflow is missing its {0}")]
    Incomplete(&'static str),
}

/// Issued token together with the evidence it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmploymentReport {
    pub token: Token,
    #[serde(flatten)]
    pub evidence: EmploymentEvidence,
}

pub struct VerificationWorkflow {
    documents: Arc<dyn DocumentSource>,
    loader: Arc<dyn TextLoader>,
    extractor: Arc<dyn ExtractionService>,
    enrichment: Arc<dyn EnrichmentLookup>,
    machine: Arc<ConfirmationStateMachine>,
    notifier: Arc<dyn Notifier>,
    reconciler: Reconciler,
    public_base_url: String,
}

impl VerificationWorkflow {
    pub fn builder() -> VerificationWorkflowBuilder {
        VerificationWorkflowBuilder::default()
    }

    /// Age check from a birth certificate, as of `today`.
    #[tracing::instrument(skip(self))]
    pub async fn verify_age(
        &self,
        document_id: &str,
        today: NaiveDate,
    ) -> Result<BirthEvidence, WorkflowError> {
        let document = self.documents.fetch(document_id).await?;
        let map = self
            .extract(&document, ExtractionSchema::BirthCertificate)
            .await?;

        let evidence = self
            .reconciler
            .reconcile_birth(BirthEntities::from_map(&map), today);
        tracing::info!(age = ?evidence.age, "Age verification completed");
        Ok(evidence)
    }

    /// Employment check from an employment letter.
    ///
    /// Issues a pending record and, if a reviewer was found, asks them to
    /// confirm or deny.
    #[tracing::instrument(skip(self))]
    pub async fn verify_employment(
        &self,
        document_id: &str,
    ) -> Result<EmploymentReport, WorkflowError> {
        let document = self.documents.fetch(document_id).await?;
        let map = self
            .extract(&document, ExtractionSchema::EmploymentLetter)
            .await?;
        let entities = EmploymentEntities::from_map(&map);

        let domain = employer_domain(&document, &entities);
        let outcome = enrich(self.enrichment.as_ref(), domain.as_deref()).await;
        let evidence = self.reconciler.reconcile(&entities, outcome);

        let token = self.machine.issue(evidence.clone()).await?;
        self.request_confirmation(token, &evidence).await;

        Ok(EmploymentReport { token, evidence })
    }

    async fn extract(
        &self,
        document: &DocumentRef,
        schema: ExtractionSchema,
    ) -> Result<vouch_core::EntityMap, WorkflowError> {
        let text = self.loader.load_text(&document.url).await?;
        Ok(self.extractor.extract(schema, &text).await?)
    }

    async fn request_confirmation(&self, token: Token, evidence: &EmploymentEvidence) {
        let Some(recipient) = evidence.reviewer_email() else {
            tracing::warn!(%token, "No reviewer email found, confirmation request not sent");
            return;
        };

        let request = ConfirmationRequest::new(
            token,
            evidence.employee_name.clone(),
            recipient,
            &self.public_base_url,
        );
        match self.notifier.request_confirmation(&request).await {
            Ok(()) => tracing::info!(%token, "Confirmation requested"),
            Err(e) => tracing::error!(%token, error = %e, "Failed to send confirmation request"),
        }
    }
}

/// Employer domain from the document metadata, falling back to the website
/// named in the letter.
fn employer_domain(document: &DocumentRef, entities: &EmploymentEntities) -> Option<String> {
    let from_metadata = document
        .extra_properties
        .as_deref()
        .and_then(parse_extra_properties)
        .and_then(|props| organization_website(&props))
        .and_then(|url| extract_domain(&url));

    from_metadata.or_else(|| {
        entities
            .company_website
            .as_deref()
            .and_then(extract_domain)
    })
}

#[derive(Default)]
pub struct VerificationWorkflowBuilder {
    documents: Option<Arc<dyn DocumentSource>>,
    loader: Option<Arc<dyn TextLoader>>,
    extractor: Option<Arc<dyn ExtractionService>>,
    enrichment: Option<Arc<dyn EnrichmentLookup>>,
    machine: Option<Arc<ConfirmationStateMachine>>,
    notifier: Option<Arc<dyn Notifier>>,
    public_base_url: Option<String>,
}

impl VerificationWorkflowBuilder {
    pub fn documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn text_loader(mut self, loader: Arc<dyn TextLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ExtractionService>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Defaults to [`NoEnrichment`].
    pub fn enrichment(mut self, enrichment: Arc<dyn EnrichmentLookup>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    pub fn machine(mut self, machine: Arc<ConfirmationStateMachine>) -> Self {
        self.machine = Some(machine);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<VerificationWorkflow, WorkflowError> {
        Ok(VerificationWorkflow {
            documents: self.documents.ok_or(WorkflowError::Incomplete("document source"))?,
            loader: self.loader.ok_or(WorkflowError::Incomplete("text loader"))?,
            extractor: self.extractor.ok_or(WorkflowError::Incomplete("extractor"))?,
            enrichment: self.enrichment.unwrap_or_else(|| Arc::new(NoEnrichment)),
            machine: self.machine.ok_or(WorkflowError::Incomplete("state machine"))?,
            notifier: self.notifier.ok_or(WorkflowError::Incomplete("notifier"))?,
            reconciler: Reconciler::new(),
            public_base_url: self
                .public_base_url
                .ok_or(WorkflowError::Incomplete("public base URL"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::documents::{InMemoryDocuments, StoredDocument};
    use crate::store::InMemoryStore;
    use crate::test_support::{MockExtractor, MockLookup, RecordingNotifier};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use vouch_core::{RecordStatus, Sources};

    struct Harness {
        workflow: VerificationWorkflow,
        machine: Arc<ConfirmationStateMachine>,
        notifier: Arc<RecordingNotifier>,
        lookup: Arc<MockLookup>,
    }

    fn letter(extra_properties: Option<&str>) -> StoredDocument {
        StoredDocument {
            document: DocumentRef {
                id: "letter".into(),
                url: "https://files.example/letter.pdf".into(),
                extension: Some("pdf".into()),
                extra_properties: extra_properties.map(str::to_string),
            },
            tier: 1,
            pages: vec!["Ada Obi has worked at Acme since 2019.".into()],
        }
    }

    fn birth_certificate() -> StoredDocument {
        StoredDocument {
            document: DocumentRef {
                id: "birth".into(),
                url: "https://files.example/birth.pdf".into(),
                extension: Some("pdf".into()),
                extra_properties: None,
            },
            tier: 1,
            pages: vec!["CERTIFICATE OF BIRTH".into()],
        }
    }

    fn employment_output() -> serde_json::Value {
        json!({
            "employee_name": "Ada Obi",
            "start_date": "1 March 2019",
            "current_staff": true,
            "job_role": "Analyst",
            "salary": "NGN 4,800,000",
            "company_name": "Acme Ltd",
            "company_website": "https://acme-letters.example",
            "representative": "John Bello",
            "representative_position": "Head of People",
            "representative_email": "john@acme.example",
            "representative_phone_number": null
        })
    }

    fn harness(lookup: MockLookup, extractor: MockExtractor, extra: Option<&str>) -> Harness {
        let docs = InMemoryDocuments::new();
        docs.insert(letter(extra));
        docs.insert(birth_certificate());
        let docs = Arc::new(docs);

        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()));
        let machine = Arc::new(ConfirmationStateMachine::new(
            Arc::new(InMemoryStore::new()),
            notifier.clone(),
            clock,
        ));
        let lookup = Arc::new(lookup);

        let workflow = VerificationWorkflow::builder()
            .documents(docs.clone())
            .text_loader(docs)
            .extractor(Arc::new(extractor))
            .enrichment(lookup.clone())
            .machine(machine.clone())
            .notifier(notifier.clone())
            .public_base_url("https://verify.example.com")
            .build()
            .unwrap();

        Harness {
            workflow,
            machine,
            notifier,
            lookup,
        }
    }

    #[tokio::test]
    async fn test_employment_with_reviewer() {
        let extractor =
            MockExtractor::new().with_output(ExtractionSchema::EmploymentLetter, employment_output());
        let h = harness(
            MockLookup::found("grace@acme.example"),
            extractor,
            Some(r#"{\"website_url\": \"https://www.Acme.example/about\"}"#),
        );

        let report = h.workflow.verify_employment("letter").await.unwrap();
        assert_eq!(report.evidence.employee_name.as_deref(), Some("Ada Obi"));
        assert_eq!(report.evidence.reviewer_email(), Some("grace@acme.example"));
        assert_eq!(h.lookup.domains(), vec!["acme.example".to_string()]);

        let view = h.machine.status(&report.token).await.unwrap();
        assert_eq!(view.status, RecordStatus::Pending);

        let requests = h.notifier.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].recipient, "grace@acme.example");
        assert!(requests[0]
            .confirm_url
            .ends_with(&format!("/api/verify/confirm-employment/?token={}", report.token)));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["token"], report.token.to_string());
        assert_eq!(json["employment_date"], "1 March 2019");
    }

    #[tokio::test]
    async fn test_employment_falls_back_to_letter_website() {
        let extractor =
            MockExtractor::new().with_output(ExtractionSchema::EmploymentLetter, employment_output());
        let h = harness(
            MockLookup::empty(),
            extractor,
            Some(r#"{"website_url": "Not Available"}"#),
        );

        let report = h.workflow.verify_employment("letter").await.unwrap();
        assert_eq!(h.lookup.domains(), vec!["acme-letters.example".to_string()]);
        assert_eq!(report.evidence.reviewer_email(), None);
        assert!(h.notifier.requests().is_empty());
        assert!(h.machine.status(&report.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_websites_skip_enrichment() {
        let mut output = employment_output();
        output["company_website"] = json!("https://192.168.0.1/admin");
        let extractor = MockExtractor::new().with_output(ExtractionSchema::EmploymentLetter, output);
        let h = harness(
            MockLookup::found("grace@acme.example"),
            extractor,
            Some(r#"{"website_url": "acme.example,hr.example"}"#),
        );

        let report = h.workflow.verify_employment("letter").await.unwrap();
        assert!(h.lookup.domains().is_empty());
        assert_eq!(report.evidence.reviewer_email(), None);
        assert!(h.notifier.requests().is_empty());
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_not_fatal() {
        let extractor =
            MockExtractor::new().with_output(ExtractionSchema::EmploymentLetter, employment_output());
        let h = harness(MockLookup::failing(), extractor, None);

        let report = h.workflow.verify_employment("letter").await.unwrap();
        let Sources::Collected(map) = &report.evidence.sources else {
            panic!("letter representative should still be collected");
        };
        assert!(map.enrichment_lookup.is_none());
        assert!(map.primary_document.is_some());
        assert!(h.notifier.requests().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_is_fatal() {
        let h = harness(MockLookup::empty(), MockExtractor::new(), None);

        let err = h.workflow.verify_employment("letter").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Extraction(_)));
        assert!(h.lookup.domains().is_empty());
    }

    #[tokio::test]
    async fn test_missing_document() {
        let h = harness(MockLookup::empty(), MockExtractor::new(), None);
        let err = h.workflow.verify_employment("nope").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Document(DocumentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_age_verification() {
        let extractor = MockExtractor::new().with_output(
            ExtractionSchema::BirthCertificate,
            json!({
                "birth_date": "15th",
                "birth_month": "march",
                "birth_year": "2000",
                "birth_state": "Lagos",
                "birth_country": "Nigeria"
            }),
        );
        let h = harness(MockLookup::empty(), extractor, None);

        let before_birthday = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let evidence = h.workflow.verify_age("birth", before_birthday).await.unwrap();
        assert_eq!(evidence.age, Some(23));

        let on_birthday = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let evidence = h.workflow.verify_age("birth", on_birthday).await.unwrap();
        assert_eq!(evidence.age, Some(24));
        assert_eq!(evidence.entities.birth_country.as_deref(), Some("Nigeria"));
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = VerificationWorkflow::builder().build().err().unwrap();
        assert!(matches!(err, WorkflowError::Incomplete("document source")));
    }
}
