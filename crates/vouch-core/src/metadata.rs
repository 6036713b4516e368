//! Document metadata parsing.
//!
//! Documents may carry an `extra_properties` blob written by an upstream
//! system that double-escapes quotes. Nothing here fails loudly: bad input
//! yields `None` and a warning, and the workflow carries on without it.

use serde_json::{Map, Value};
use url::{Host, Url};

/// Values the upstream uses for a missing website.
const NOT_AVAILABLE: &str = "not available";

/// Parse the raw extra-properties blob into a JSON object.
pub fn parse_extra_properties(raw: &str) -> Option<Map<String, Value>> {
    let unescaped = raw.replace("\\\"", "\"").replace("\\'", "'");
    let trimmed = unescaped.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            tracing::warn!(kind = %json_kind(&other), "Extra properties are not a JSON object");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse extra properties");
            None
        }
    }
}

/// The organization's website, if the properties name a usable one.
pub fn organization_website(props: &Map<String, Value>) -> Option<String> {
    let url = props.get("website_url")?.as_str()?.trim();
    if url.is_empty() || url.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return None;
    }
    Some(url.to_string())
}

/// Registrable host of a website, lowercased and in ASCII form, without a
/// leading `www.`.
///
/// Bare hosts like `acme.example/careers` are read as `https://`. Anything
/// that is not an http(s) URL naming a DNS host yields `None`: IP literals,
/// single-label hosts, and identifiers with characters a hostname can't hold.
pub fn extract_domain(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() || website.contains(|c: char| c.is_whitespace() || c == '\\') {
        return None;
    }

    let parsed = if website.contains("://") {
        Url::parse(website)
    } else {
        Url::parse(&format!("https://{website}"))
    }
    .ok()?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let Some(Host::Domain(host)) = parsed.host() else {
        return None;
    };

    let host = host.strip_suffix('.').unwrap_or(host);
    let host = host.strip_prefix("www.").unwrap_or(host);
    is_dns_name(host).then(|| host.to_string())
}

/// At least two LDH labels, with a non-numeric top label.
fn is_dns_name(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| is_ldh_label(label))
        && labels
            .last()
            .is_some_and(|tld| !tld.bytes().all(|b| b.is_ascii_digit()))
}

fn is_ldh_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
