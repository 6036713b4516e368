//! LLM provider abstraction used for entity extraction.
//!
//! Extraction is always a forced tool call: the provider is handed exactly one
//! tool whose input schema is the extraction schema, and the structured tool
//! input is returned as JSON. Free text completions are never used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

mod factory;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use factory::{ProviderFactory, ProviderRegistry};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory, ANTHROPIC_API_KEY_ENV};

use crate::secrets::CredentialError;

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Response did not call tool '{0}'")]
    MissingToolCall(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl From<CredentialError> for ProviderError {
    fn from(err: CredentialError) -> Self {
        ProviderError::NotConfigured(err.to_string())
    }
}

/// Per-request settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,

    /// 0.0 for deterministic extraction
    pub temperature: f32,

    pub timeout: Duration,

    /// Mark the system instruction as cacheable (Anthropic-specific)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(30),
            prompt_caching: true,
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The single tool a provider is forced to call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: JsonValue,
}

/// Structured answer from a forced tool call.
#[derive(Debug, Clone)]
pub struct ToolCallResponse {
    /// Tool input as produced by the model
    pub input: JsonValue,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Token usage from a call.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,

    /// Tokens read from cache (Anthropic)
    pub cache_read_tokens: u32,

    /// Tokens written to cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Backend able to answer a forced tool call.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `messages` and force a call to `tool`.
    async fn call_tool(
        &self,
        messages: Vec<ChatMessage>,
        tool: &ToolDefinition,
        config: &CompletionConfig,
    ) -> Result<ToolCallResponse, ProviderError>;

    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;

    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 chars per token
        (text.len() / 4) as u32
    }
}
