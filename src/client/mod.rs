//! # Remote Clients
//!
//! HTTP clients for the two services a processing run talks to:
//!
//! - **[`BackendApiClient`]**: the REST backend that starts, finishes, cancels
//!   and reports processing runs
//! - **[`WorkerApiClient`]**: the scoring worker that receives one call per batch
//!
//! Both implement the traits in [`traits`], which is all the orchestrator
//! depends on.

pub mod backend_client;
pub mod traits;
pub mod worker_client;

pub use backend_client::BackendApiClient;
pub use traits::{BatchWorker, ProcessingBackend};
pub use worker_client::WorkerApiClient;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;

use crate::config::ConfigurationError;

const USER_AGENT: &str = concat!("ddc-processing/", env!("CARGO_PKG_VERSION"));

/// Parse a base URL so relative endpoint paths append to it
pub(crate) fn parse_base_url(field: &str, raw: &str) -> Result<Url, ConfigurationError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized)
        .map_err(|e| ConfigurationError::invalid_value(field, raw, e.to_string()))
}

/// Default headers shared by both clients
pub(crate) fn default_headers(bearer_token: Option<&str>) -> Result<HeaderMap, ConfigurationError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            ConfigurationError::invalid_value("api.bearer_token", "[MASKED]", e.to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

pub(crate) fn build_http_client(
    timeout: std::time::Duration,
    bearer_token: Option<&str>,
) -> Result<reqwest::Client, ConfigurationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(default_headers(bearer_token)?)
        .build()
        .map_err(|e| ConfigurationError::invalid_value("http_client", "builder", e.to_string()))
}

/// Pull a human message out of an error response body
///
/// Looks at `error`, `detail` and `message` keys in that order, then falls
/// back to the raw body, then to the status line.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(message) = value.get(key).and_then(serde_json::Value::as_str) {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed.to_string()
    }
}
