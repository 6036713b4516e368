//! Runtime configuration.
//!
//! Loaded from YAML, then overridden from the environment. Durations are
//! written in humantime form ("45s", "1h 30m"). Every field has a default so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::resilience::CircuitBreakerConfig;

/// Callback URL for decision relays.
pub const CALLBACK_URL_ENV: &str = "VOUCH_CALLBACK_URL";

/// Accepted for compatibility with older deployments.
pub const LEGACY_CALLBACK_URL_ENV: &str = "CALLBACK_URL";

/// Base URL the confirm/deny links point at.
pub const PUBLIC_BASE_URL_ENV: &str = "VOUCH_PUBLIC_BASE_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for humantime duration strings.
pub mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Where decisions are relayed. `None` disables the relay.
    pub callback_url: Option<String>,

    pub public_base_url: String,

    /// Where confirmation requests are posted for delivery to reviewers.
    pub notification_url: Option<String>,

    pub documents: DocumentServiceConfig,
    pub dispatch: DispatchConfig,
    pub timeouts: TimeoutConfig,
    pub enrichment: EnrichmentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub extraction: ExtractionConfig,
    pub provider: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            callback_url: None,
            public_base_url: "http://localhost:8000".to_string(),
            notification_url: None,
            documents: DocumentServiceConfig::default(),
            dispatch: DispatchConfig::default(),
            timeouts: TimeoutConfig::default(),
            enrichment: EnrichmentConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            extraction: ExtractionConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Where document metadata, classifications and text come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentServiceConfig {
    /// Serves `GET {base_url}/documents/{id}` and
    /// `GET {base_url}/documents/{id}/classification`
    pub base_url: Option<String>,

    /// Serves `POST {text_url}` with `{"url": ...}`, answering `{"pages": [...]}`
    pub text_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Concurrent background analyses
    pub workers: usize,

    /// Concurrent inline (tier 1/2) analyses
    pub inline_workers: usize,

    /// Background jobs allowed to wait for a free worker
    pub queue_depth: usize,

    /// Upper bound on an inline (tier 1/2) analysis
    #[serde(with = "human_duration")]
    pub sync_timeout: Duration,

    /// Estimate returned with deferred (tier 3) jobs
    #[serde(with = "human_duration")]
    pub deferred_estimate: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            inline_workers: 4,
            queue_depth: 64,
            sync_timeout: Duration::from_secs(45),
            deferred_estimate: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "human_duration")]
    pub extraction: Duration,

    #[serde(with = "human_duration")]
    pub enrichment: Duration,

    /// Per attempt
    #[serde(with = "human_duration")]
    pub webhook: Duration,

    #[serde(with = "human_duration")]
    pub document_fetch: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extraction: Duration::from_secs(30),
            enrichment: Duration::from_secs(10),
            webhook: Duration::from_secs(10),
            document_fetch: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    #[serde(with = "human_duration")]
    pub cache_ttl: Duration,

    pub cache_capacity: u64,

    /// Job titles searched for at the employer
    pub person_titles: Vec<String>,

    /// Lookup-specific settings such as `api_token` and `base_url`
    #[serde(flatten)]
    pub settings: Map<String, JsonValue>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 1_000,
            person_titles: vec!["HR".to_string(), "Admin".to_string()],
            settings: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub model: String,
    pub max_tokens: u32,

    /// Total tokens all extraction calls may spend over the process lifetime
    pub token_budget: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1024,
            token_budget: 5_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,

    /// Provider-specific settings, handed to the provider factory as JSON
    #[serde(flatten)]
    pub settings: Map<String, JsonValue>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "anthropic".to_string(),
            settings: Map::new(),
        }
    }
}

impl ProviderConfig {
    pub fn settings_json(&self) -> JsonValue {
        JsonValue::Object(self.settings.clone())
    }
}

impl EnrichmentConfig {
    pub fn settings_json(&self) -> JsonValue {
        JsonValue::Object(self.settings.clone())
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(CALLBACK_URL_ENV).or_else(|| non_empty(LEGACY_CALLBACK_URL_ENV)) {
            self.callback_url = Some(url);
        }
        if let Some(url) = non_empty(PUBLIC_BASE_URL_ENV) {
            self.public_base_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.workers == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.workers must be at least 1".to_string(),
            ));
        }
        if self.dispatch.inline_workers == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.inline_workers must be at least 1".to_string(),
            ));
        }

        let urls = [
            ("public_base_url", Some(&self.public_base_url)),
            ("callback_url", self.callback_url.as_ref()),
            ("notification_url", self.notification_url.as_ref()),
            ("documents.base_url", self.documents.base_url.as_ref()),
            ("documents.text_url", self.documents.text_url.as_ref()),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "{} must start with http:// or https://",
                        field
                    )));
                }
            }
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = RuntimeConfig::from_yaml("").unwrap();
        assert_eq!(config.dispatch.workers, 4);
        assert_eq!(config.dispatch.inline_workers, 4);
        assert_eq!(config.dispatch.queue_depth, 64);
        assert_eq!(config.dispatch.sync_timeout, Duration::from_secs(45));
        assert_eq!(config.dispatch.deferred_estimate, Duration::from_secs(60));
        assert_eq!(config.enrichment.person_titles, vec!["HR", "Admin"]);
        assert_eq!(config.provider.kind, "anthropic");
        assert!(config.callback_url.is_none());
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
public_base_url: "https://verify.example.com/"
callback_url: "https://core.example.com/hooks/employment"
dispatch:
  workers: 8
  sync_timeout: 20s
timeouts:
  enrichment: 2s 500ms
enrichment:
  cache_ttl: 30m
  api_token: "apollo-key"
circuit_breaker:
  failure_threshold: 5
  recovery_timeout: 1m
provider:
  type: anthropic
  base_url: "https://proxy.example.com/v1"
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.base_url(), "https://verify.example.com");
        assert_eq!(config.dispatch.workers, 8);
        assert_eq!(config.dispatch.sync_timeout, Duration::from_secs(20));
        assert_eq!(config.dispatch.deferred_estimate, Duration::from_secs(60));
        assert_eq!(config.timeouts.enrichment, Duration::from_millis(2500));
        assert_eq!(config.enrichment.cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.enrichment.settings_json()["api_token"], "apollo-key");
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.provider.settings_json()["base_url"], "https://proxy.example.com/v1");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_yaml("dispatch:\n  workers: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("dispatch:\n  inline_workers: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("callback_url: ftp://example.com\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("dispatch:\n  sync_timeout: soon\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (LEGACY_CALLBACK_URL_ENV, "https://legacy.example.com/cb"),
            (PUBLIC_BASE_URL_ENV, "https://public.example.com"),
        ]);
        let config = RuntimeConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.callback_url.as_deref(), Some("https://legacy.example.com/cb"));
        assert_eq!(config.public_base_url, "https://public.example.com");

        let env: HashMap<&str, &str> = HashMap::from([
            (CALLBACK_URL_ENV, "https://new.example.com/cb"),
            (LEGACY_CALLBACK_URL_ENV, "https://legacy.example.com/cb"),
        ]);
        let config = RuntimeConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.callback_url.as_deref(), Some("https://new.example.com/cb"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = RuntimeConfig::from_yaml(include_str!("../../../vouch.example.yaml")).unwrap();
        assert_eq!(config.timeouts.document_fetch, Duration::from_secs(20));
        assert_eq!(config.documents.text_url.as_deref(), Some("https://documents.example/api/text"));
        assert_eq!(config.extraction.token_budget, 5_000_000);
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_yaml_file("/nonexistent/vouch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
