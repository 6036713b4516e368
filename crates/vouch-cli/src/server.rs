//! HTTP binding.
//!
//! Routes live under `/api`, plus `/health`. Path params use `:param`
//! syntax (axum 0.7).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use vouch_core::{Decision, Token};
use vouch_runtime::{
    Clock, ConfirmationStateMachine, DispatchError, DispatchOutcome, DocumentError, TaskDispatcher,
    Transition, TransitionError, VerificationWorkflow, WorkflowError,
};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<VerificationWorkflow>,
    pub machine: Arc<ConfirmationStateMachine>,
    pub dispatcher: Arc<TaskDispatcher>,
}

/// Errors rendered as `{"error": "..."}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid PDF type")]
    InvalidPdfType,
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidPdfType => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(detail) => {
                tracing::error!(detail, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Document(DocumentError::NotFound(id)) => {
                AppError::NotFound(format!("Document {id} not found"))
            }
            WorkflowError::Document(e) => AppError::Upstream(e.to_string()),
            WorkflowError::Extraction(e) => AppError::Upstream(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnsupportedCategory(_) => AppError::InvalidPdfType,
            DispatchError::Classification(e) => AppError::Unprocessable(e.to_string()),
            DispatchError::Timeout(_) => AppError::Timeout(err.to_string()),
            DispatchError::Analysis(_) => AppError::Upstream(err.to_string()),
            DispatchError::Worker(_) => AppError::Internal(err.to_string()),
            DispatchError::QueueFull(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/verify/age/:document_id", get(verify_age))
        .route("/verify/employment/:document_id", get(verify_employment))
        .route("/verify/confirm-employment/", get(confirm_employment))
        .route("/verify/confirm-employment", get(confirm_employment))
        .route("/verify/deny-employment/", get(deny_employment))
        .route("/verify/deny-employment", get(deny_employment))
        .route("/verify/status/:token", get(verification_status))
        .route("/analyze/:document_id", get(analyze));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
}

async fn verify_age(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let today = state.machine.clock().now().date_naive();
    let evidence = state.workflow.verify_age(&document_id, today).await?;
    Ok(Json(json!({ "result": evidence })))
}

async fn verify_employment(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = state.workflow.verify_employment(&document_id).await?;
    Ok(Json(json!({ "result": report })))
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

async fn confirm_employment(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    decide(&state, query.token, Decision::Confirm).await
}

async fn deny_employment(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    decide(&state, query.token, Decision::Deny).await
}

async fn decide(state: &AppState, token: Option<String>, decision: Decision) -> Response {
    let Some(token) = token.and_then(|t| t.trim().parse::<Token>().ok()) else {
        return "Invalid token.".into_response();
    };

    let result = match decision {
        Decision::Confirm => state.machine.confirm(&token).await,
        Decision::Deny => state.machine.deny(&token).await,
    };

    match result {
        Ok(Transition::Applied(_)) => match decision {
            Decision::Confirm => "Employment confirmed.".into_response(),
            Decision::Deny => "Employment denied.".into_response(),
        },
        Ok(Transition::AlreadyDecided(record)) => {
            let recorded = if record.is_verified() {
                "confirmed"
            } else {
                "denied"
            };
            format!("Employment already recorded as {recorded}.").into_response()
        }
        Err(TransitionError::NotFound) => "Invalid token.".into_response(),
        Err(TransitionError::Expired { .. }) => {
            (StatusCode::GONE, "Verification link has expired.").into_response()
        }
        Err(TransitionError::Store(e)) => AppError::Internal(e.to_string()).into_response(),
    }
}

async fn verification_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("Token not found".to_string());
    let token: Token = token.parse().map_err(|_| not_found())?;

    match state.machine.status(&token).await {
        Ok(view) => Ok(Json(view).into_response()),
        Err(TransitionError::NotFound) => Err(not_found()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

async fn analyze(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DispatchOutcome>, AppError> {
    Ok(Json(state.dispatcher.dispatch(&document_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;
    use vouch_core::{EntityMap, ExtractionSchema};
    use vouch_runtime::config::DispatchConfig;
    use vouch_runtime::documents::InMemoryDocuments;
    use vouch_runtime::extraction::{checked_entities, ExtractionError, ExtractionService};
    use vouch_runtime::{
        InMemoryStore, ManualClock, QueueFull, StatementAnalyzer, TokioExecutor, TracingNotifier,
    };

    const FIXTURES: &str = r#"
- id: letter
  url: https://files.example/letter.pdf
  extension: pdf
  tier: 1
  pages: ["Ada Obi has worked at Acme since 2019."]
- id: birth
  url: https://files.example/birth.pdf
  tier: 1
  pages: ["CERTIFICATE OF BIRTH"]
- id: statement
  url: https://files.example/statement.pdf
  tier: 2
  pages: ["Opening balance 100.00"]
- id: scan
  url: https://files.example/scan.pdf
  tier: 3
  pages: ["Scanned statement"]
- id: odd
  url: https://files.example/odd.pdf
  tier: 9
  pages: ["?"]
"#;

    struct FixedExtractor;

    #[async_trait]
    impl ExtractionService for FixedExtractor {
        async fn extract(
            &self,
            schema: ExtractionSchema,
            _text: &str,
        ) -> Result<EntityMap, ExtractionError> {
            let output = match schema {
                ExtractionSchema::BirthCertificate => json!({
                    "birth_date": "15",
                    "birth_month": "March",
                    "birth_year": "2000",
                    "birth_state": "Lagos",
                    "birth_country": "Nigeria"
                }),
                ExtractionSchema::EmploymentLetter => json!({
                    "employee_name": "Ada Obi",
                    "start_date": "1 March 2019",
                    "current_staff": true,
                    "company_name": "Acme Ltd"
                }),
                ExtractionSchema::BankStatement => json!({
                    "account_holder": "Ada Obi",
                    "opening_balance": "100.00"
                }),
            };
            checked_entities(schema, output)
        }
    }

    fn app() -> (Router, Arc<ManualClock>) {
        let docs = Arc::new(InMemoryDocuments::from_yaml(FIXTURES).unwrap());
        let extractor: Arc<dyn ExtractionService> = Arc::new(FixedExtractor);
        let notifier = Arc::new(TracingNotifier);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap(),
        ));

        let machine = Arc::new(ConfirmationStateMachine::new(
            Arc::new(InMemoryStore::new()),
            notifier.clone(),
            clock.clone(),
        ));
        let workflow = VerificationWorkflow::builder()
            .documents(docs.clone())
            .text_loader(docs.clone())
            .extractor(extractor.clone())
            .machine(machine.clone())
            .notifier(notifier)
            .public_base_url("http://localhost:8000")
            .build()
            .unwrap();

        let config = DispatchConfig::default();
        let analyzer = Arc::new(StatementAnalyzer::new(docs.clone(), extractor));
        let executor = Arc::new(TokioExecutor::from_config(analyzer, &config));
        let dispatcher = Arc::new(TaskDispatcher::new(docs, executor, &config));

        let state = AppState {
            workflow: Arc::new(workflow),
            machine,
            dispatcher,
        };
        (router(state), clock)
    }

    async fn fetch(app: &Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn fetch_json(app: &Router, uri: &str) -> (StatusCode, JsonValue) {
        let (status, body) = fetch(app, uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        assert_eq!(fetch(&app, "/health").await, (StatusCode::OK, "ok".to_string()));
    }

    #[tokio::test]
    async fn test_age_endpoint() {
        let (app, _) = app();
        let (status, body) = fetch_json(&app, "/api/verify/age/birth").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["age"], 23);
        assert_eq!(body["result"]["birth_state"], "Lagos");
    }

    #[tokio::test]
    async fn test_employment_confirm_flow() {
        let (app, _) = app();
        let (status, body) = fetch_json(&app, "/api/verify/employment/letter").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["employee_name"], "Ada Obi");
        let token = body["result"]["token"].as_str().unwrap().to_string();

        let (_, view) = fetch_json(&app, &format!("/api/verify/status/{token}")).await;
        assert_eq!(view["status"], "pending");
        assert_eq!(view["verified_at"], JsonValue::Null);

        let confirm = format!("/api/verify/confirm-employment/?token={token}");
        assert_eq!(
            fetch(&app, &confirm).await,
            (StatusCode::OK, "Employment confirmed.".to_string())
        );
        assert_eq!(
            fetch(&app, &format!("/api/verify/deny-employment/?token={token}")).await,
            (
                StatusCode::OK,
                "Employment already recorded as confirmed.".to_string()
            )
        );

        let (_, view) = fetch_json(&app, &format!("/api/verify/status/{token}")).await;
        assert_eq!(view["status"], "verified");
        assert_eq!(view["is_verified"], true);
        assert_eq!(view["verified_at"], "2024-03-14 09:30:00");
    }

    #[tokio::test]
    async fn test_deny_and_invalid_tokens() {
        let (app, _) = app();
        let (_, body) = fetch_json(&app, "/api/verify/employment/letter").await;
        let token = body["result"]["token"].as_str().unwrap().to_string();

        assert_eq!(
            fetch(&app, &format!("/api/verify/deny-employment?token={token}")).await,
            (StatusCode::OK, "Employment denied.".to_string())
        );
        assert_eq!(
            fetch(&app, "/api/verify/confirm-employment/?token=not-a-token").await.1,
            "Invalid token."
        );
        assert_eq!(
            fetch(&app, "/api/verify/confirm-employment/").await.1,
            "Invalid token."
        );
        let unknown = Token::generate();
        assert_eq!(
            fetch(&app, &format!("/api/verify/deny-employment/?token={unknown}")).await.1,
            "Invalid token."
        );
    }

    #[tokio::test]
    async fn test_expired_link() {
        let (app, clock) = app();
        let (_, body) = fetch_json(&app, "/api/verify/employment/letter").await;
        let token = body["result"]["token"].as_str().unwrap().to_string();

        clock.advance(TimeDelta::days(7));
        let (status, text) = fetch(&app, &format!("/api/verify/confirm-employment/?token={token}")).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(text, "Verification link has expired.");
    }

    #[tokio::test]
    async fn test_status_not_found() {
        let (app, _) = app();
        for token in [Token::generate().to_string(), "garbage".to_string()] {
            let (status, body) = fetch_json(&app, &format!("/api/verify/status/{token}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({ "error": "Token not found" }));
        }
    }

    #[tokio::test]
    async fn test_analyze_lanes() {
        let (app, _) = app();

        let (status, body) = fetch_json(&app, "/api/analyze/statement").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"]["account_holder"], "Ada Obi");

        let (status, body) = fetch_json(&app, "/api/analyze/scan").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(
            body["message"],
            "Analysis on this PDF would take about 60 secs so please check back"
        );

        let (status, body) = fetch_json(&app, "/api/analyze/odd").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid PDF type" }));

        let (status, _) = fetch_json(&app, "/api/analyze/missing").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let (app, _) = app();
        let (status, body) = fetch_json(&app, "/api/verify/employment/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Document missing not found");
    }

    #[test]
    fn test_full_queue_is_service_unavailable() {
        let err = AppError::from(DispatchError::QueueFull(QueueFull { capacity: 68 }));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
