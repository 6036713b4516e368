//! Outbound notifications.
//!
//! Two messages leave the engine: a confirmation request to the employer's
//! reviewer, and the reviewer's decision relayed to the downstream callback.
//! Neither may fail a verification; callers log errors and move on.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use vouch_core::{Decision, Token};

use crate::resilience::{CircuitBreaker, Dependency};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(String),

    #[error("Notification endpoint answered {status}")]
    Rejected { status: u16 },

    #[error("Notification timed out")]
    Timeout,

    #[error("Circuit open for webhooks, notification skipped")]
    CircuitOpen,
}

impl NotifyError {
    /// Connection problems, timeouts and 5xx answers are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(_) | NotifyError::Timeout => true,
            NotifyError::Rejected { status } => *status >= 500 || *status == 429,
            NotifyError::CircuitOpen => false,
        }
    }
}

/// A request asking the employer to confirm or deny employment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationRequest {
    pub token: Token,
    pub employee_name: Option<String>,
    pub recipient: String,
    pub confirm_url: String,
    pub deny_url: String,
}

impl ConfirmationRequest {
    pub const SUBJECT: &'static str = "Employee Confirmation";

    /// Build the request with links under `base_url`.
    pub fn new(
        token: Token,
        employee_name: Option<String>,
        recipient: impl Into<String>,
        base_url: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            token,
            employee_name,
            recipient: recipient.into(),
            confirm_url: format!("{base}/api/verify/confirm-employment/?token={token}"),
            deny_url: format!("{base}/api/verify/deny-employment/?token={token}"),
        }
    }

    pub fn html_body(&self) -> String {
        let name = self.employee_name.as_deref().unwrap_or("an applicant");
        format!(
            "An employee at your organization, {name}, has applied to receive a mortgage through \
             our platform. Please confirm their employment status.<br><br>\
             Click <a href='{confirm}'>Yes, they work here</a> if they currently work at your \
             organization.<br><br>\
             Click <a href='{deny}'>No, they don't work here</a> if they don't.<br><br>\
             If you are not the appropriate person to confirm this information, please forward \
             this email to your Human Resources department.<br><br>\
             Thank you for your prompt attention to this matter.",
            confirm = self.confirm_url,
            deny = self.deny_url,
        )
    }
}

/// The decision relayed downstream, sent form-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeNotice {
    pub status: &'static str,
    pub token: Token,
}

impl OutcomeNotice {
    pub fn new(decision: Decision, token: Token) -> Self {
        Self {
            status: decision.outcome_label(),
            token,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<(), NotifyError>;

    async fn relay_outcome(&self, notice: &OutcomeNotice) -> Result<(), NotifyError>;
}

/// Logs notifications instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<(), NotifyError> {
        tracing::info!(
            token = %request.token,
            recipient = %request.recipient,
            confirm_url = %request.confirm_url,
            deny_url = %request.deny_url,
            "Confirmation request"
        );
        Ok(())
    }

    async fn relay_outcome(&self, notice: &OutcomeNotice) -> Result<(), NotifyError> {
        tracing::info!(token = %notice.token, status = notice.status, "Verification outcome");
        Ok(())
    }
}

/// Notifier guarded by the webhook circuit. Both messages share it, since
/// they go to the same downstream system.
pub struct GuardedNotifier {
    inner: Arc<dyn Notifier>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedNotifier {
    pub fn new(inner: Arc<dyn Notifier>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    async fn guarded<F>(&self, send: F) -> Result<(), NotifyError>
    where
        F: Future<Output = Result<(), NotifyError>>,
    {
        if self.breaker.is_open(Dependency::Webhook) {
            return Err(NotifyError::CircuitOpen);
        }

        let result = send.await;
        match &result {
            Ok(()) => self.breaker.record_success(Dependency::Webhook),
            Err(_) => self.breaker.record_failure(Dependency::Webhook),
        }
        result
    }
}

#[async_trait]
impl Notifier for GuardedNotifier {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> Result<(), NotifyError> {
        self.guarded(self.inner.request_confirmation(request)).await
    }

    async fn relay_outcome(&self, notice: &OutcomeNotice) -> Result<(), NotifyError> {
        self.guarded(self.inner.relay_outcome(notice)).await
    }
}

#[cfg(feature = "http")]
pub use webhook::WebhookNotifier;

#[cfg(feature = "http")]
mod webhook {
    use super::*;
    use backon::{ExponentialBuilder, Retryable};
    use serde_json::json;
    use std::time::Duration;

    /// Posts outcomes to the callback URL and confirmation requests to the
    /// notification URL, retrying transient failures with backoff.
    pub struct WebhookNotifier {
        client: reqwest::Client,
        callback_url: Option<String>,
        notification_url: Option<String>,
        timeout: Duration,
        max_retries: usize,
    }

    impl WebhookNotifier {
        pub fn new(
            callback_url: Option<String>,
            notification_url: Option<String>,
            timeout: Duration,
        ) -> Result<Self, NotifyError> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| NotifyError::Http(e.to_string()))?;
            Ok(Self {
                client,
                callback_url,
                notification_url,
                timeout,
                max_retries: 3,
            })
        }

        pub fn with_max_retries(mut self, max_retries: usize) -> Self {
            self.max_retries = max_retries;
            self
        }

        fn backoff(&self) -> ExponentialBuilder {
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(200))
                .with_max_delay(Duration::from_secs(5))
                .with_max_times(self.max_retries)
        }

        async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), NotifyError> {
            let response = request.timeout(self.timeout).send().await.map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Http(e.to_string())
                }
            })?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(NotifyError::Rejected {
                    status: status.as_u16(),
                })
            }
        }
    }

    #[async_trait]
    impl Notifier for WebhookNotifier {
        async fn request_confirmation(
            &self,
            request: &ConfirmationRequest,
        ) -> Result<(), NotifyError> {
            let Some(url) = self.notification_url.as_deref() else {
                tracing::warn!(token = %request.token, "No notification URL configured, request not sent");
                return Ok(());
            };

            let body = json!({
                "to": [request.recipient],
                "subject": ConfirmationRequest::SUBJECT,
                "html": request.html_body(),
                "token": request.token,
            });

            (|| async { self.send(self.client.post(url).json(&body)).await })
                .retry(self.backoff())
                .when(NotifyError::is_retryable)
                .notify(|err, delay| {
                    tracing::warn!(error = %err, ?delay, "Retrying confirmation request");
                })
                .await
        }

        async fn relay_outcome(&self, notice: &OutcomeNotice) -> Result<(), NotifyError> {
            let Some(url) = self.callback_url.as_deref() else {
                tracing::warn!(token = %notice.token, "No callback URL configured, outcome not relayed");
                return Ok(());
            };

            (|| async { self.send(self.client.post(url).form(notice)).await })
                .retry(self.backoff())
                .when(NotifyError::is_retryable)
                .notify(|err, delay| {
                    tracing::warn!(error = %err, ?delay, "Retrying outcome relay");
                })
                .await
        }
    }
}
