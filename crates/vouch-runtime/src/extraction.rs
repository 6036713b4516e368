//! Entity extraction through an LLM provider.
//!
//! Every call is guarded in the same order: circuit breaker, token budget,
//! timeout. Whatever comes back is validated against the schema before it is
//! handed on, so downstream code only ever sees schema-conforming maps.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vouch_core::{validate_entities, EntityMap, ExtractionSchema, SchemaError};

use crate::config::RuntimeConfig;
use crate::prompts::system_instruction;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, ToolDefinition};
use crate::resilience::{BudgetTracker, CircuitBreaker, Dependency, LlmUsage};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Extraction output for {schema} violates its schema: {}", .violations.join("; "))]
    Invalid {
        schema: ExtractionSchema,
        violations: Vec<String>,
    },

    #[error("Extraction output for {0} is not a JSON object")]
    NotAnObject(ExtractionSchema),

    #[error("Extraction circuit is open")]
    CircuitOpen,

    #[error("Extraction token budget exhausted")]
    BudgetExceeded,

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),
}

/// Reads structured entities out of document text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, schema: ExtractionSchema, text: &str)
        -> Result<EntityMap, ExtractionError>;
}

/// [`ExtractionService`] backed by a forced tool call.
pub struct LlmExtractor {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    budget: BudgetTracker,
}

impl LlmExtractor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: &RuntimeConfig,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let completion = CompletionConfig {
            model: config.extraction.model.clone(),
            max_tokens: config.extraction.max_tokens,
            timeout: config.timeouts.extraction,
            ..CompletionConfig::default()
        };

        Self {
            provider,
            completion,
            circuit_breaker,
            budget: BudgetTracker::new(config.extraction.token_budget),
        }
    }

    pub fn usage(&self) -> LlmUsage {
        self.budget.usage()
    }

    fn tool(schema: ExtractionSchema) -> Result<ToolDefinition, SchemaError> {
        Ok(ToolDefinition {
            name: schema.function_name().to_string(),
            description: schema.description().to_string(),
            input_schema: schema.parameters()?,
        })
    }
}

/// Validate a tool input and turn it into an entity map.
pub fn checked_entities(
    schema: ExtractionSchema,
    input: JsonValue,
) -> Result<EntityMap, ExtractionError> {
    validate_entities(schema, &input)
        .map_err(|violations| ExtractionError::Invalid { schema, violations })?;

    match input {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ExtractionError::NotAnObject(schema)),
    }
}

#[async_trait]
impl ExtractionService for LlmExtractor {
    #[tracing::instrument(skip(self, schema, text), fields(schema = %schema, provider = self.provider.name()))]
    async fn extract(
        &self,
        schema: ExtractionSchema,
        text: &str,
    ) -> Result<EntityMap, ExtractionError> {
        if self.circuit_breaker.is_open(Dependency::Extraction) {
            tracing::warn!("Circuit open, refusing extraction");
            return Err(ExtractionError::CircuitOpen);
        }

        let instruction = system_instruction(schema);
        let estimated = self.provider.estimate_tokens(&instruction)
            + self.provider.estimate_tokens(text)
            + self.completion.max_tokens;
        if !self.budget.can_afford(estimated) {
            tracing::warn!(estimated, remaining = self.budget.remaining(), "Token budget exhausted");
            return Err(ExtractionError::BudgetExceeded);
        }

        let tool = Self::tool(schema)?;
        let messages = vec![ChatMessage::system(instruction), ChatMessage::user(text)];
        let timeout = self.completion.timeout;

        let call = self.provider.call_tool(messages, &tool, &self.completion);
        let response = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => {
                self.circuit_breaker.record_success(Dependency::Extraction);
                response
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Extraction call failed");
                self.circuit_breaker.record_failure(Dependency::Extraction);
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(?timeout, "Extraction call timed out");
                self.circuit_breaker.record_failure(Dependency::Extraction);
                return Err(ExtractionError::Timeout(timeout));
            }
        };

        self.budget.record_usage(&response.usage);
        tracing::debug!(
            model = %response.model,
            tokens = response.usage.total(),
            "Extraction call completed"
        );

        checked_entities(schema, response.input)
    }
}
