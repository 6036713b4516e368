//! Apollo people search.

use serde_json::Value as JsonValue;
use vouch_core::{PhoneNumber, RepresentativeRecord};

/// Environment variable holding the Apollo API token.
pub const APOLLO_API_TOKEN_ENV: &str = "APOLLO_API_TOKEN";

#[cfg_attr(not(feature = "http"), allow(dead_code))]
const DEFAULT_BASE_URL: &str = "https://api.apollo.io/v1";

fn text(value: &JsonValue, key: &str) -> Option<String> {
    value[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read the first person of a `mixed_people/search` response.
///
/// Returns `None` when the response lists nobody.
pub fn parse_people_search(body: &JsonValue) -> Option<RepresentativeRecord> {
    let person = body["people"].as_array()?.first()?;
    let organization = &person["organization"];

    let primary_phone = &organization["primary_phone"];
    let organization_primary_phone = primary_phone.is_object().then(|| PhoneNumber {
        number: text(primary_phone, "number"),
        source: text(primary_phone, "source"),
    });

    Some(RepresentativeRecord {
        first_name: text(person, "first_name"),
        last_name: text(person, "last_name"),
        full_name: text(person, "name"),
        linkedin_url: text(person, "linkedin_url"),
        title: text(person, "title"),
        email: text(person, "email"),
        organization_name: text(organization, "name"),
        organization_website_url: text(organization, "website_url"),
        organization_phone: text(organization, "phone"),
        organization_primary_phone,
    })
}

#[cfg(feature = "http")]
pub use http::ApolloLookup;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::EnrichmentConfig;
    use crate::enrichment::{EnrichmentError, EnrichmentLookup};
    use crate::secrets::ApiCredential;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// [`EnrichmentLookup`] against Apollo's people search.
    pub struct ApolloLookup {
        client: reqwest::Client,
        credential: ApiCredential,
        base_url: String,
        person_titles: Vec<String>,
    }

    impl std::fmt::Debug for ApolloLookup {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ApolloLookup")
                .field("credential", &self.credential)
                .field("base_url", &self.base_url)
                .field("person_titles", &self.person_titles)
                .finish()
        }
    }

    impl ApolloLookup {
        /// Build from the enrichment section: `api_token` (falls back to env)
        /// and an optional `base_url`.
        pub fn from_config(config: &EnrichmentConfig, timeout: Duration) -> Result<Self, EnrichmentError> {
            let settings = config.settings_json();
            let credential = ApiCredential::from_config_or_env(
                &settings,
                "api_token",
                APOLLO_API_TOKEN_ENV,
                "Apollo API token",
            )?;

            let base_url = settings["base_url"]
                .as_str()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string();

            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| EnrichmentError::Http(e.to_string()))?;

            Ok(Self {
                client,
                credential,
                base_url,
                person_titles: config.person_titles.clone(),
            })
        }
    }

    #[async_trait]
    impl EnrichmentLookup for ApolloLookup {
        #[tracing::instrument(skip(self))]
        async fn lookup(&self, domain: &str) -> Result<Option<RepresentativeRecord>, EnrichmentError> {
            let body = json!({
                "api_key": self.credential.expose(),
                "q_organization_domains": domain,
                "page": 1,
                "person_titles": self.person_titles,
            });

            let response = self
                .client
                .post(format!("{}/mixed_people/search", self.base_url))
                .header("Cache-Control", "no-cache")
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        EnrichmentError::Timeout
                    } else {
                        EnrichmentError::Http(e.to_string())
                    }
                })?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                tracing::warn!(status = status.as_u16(), "Apollo search rejected");
                return Err(EnrichmentError::Status {
                    status: status.as_u16(),
                });
            }

            let body: JsonValue = response
                .json()
                .await
                .map_err(|e| EnrichmentError::Parse(e.to_string()))?;

            let record = parse_people_search(&body);
            tracing::debug!(found = record.is_some(), "Apollo search completed");
            Ok(record)
        }
    }
}
