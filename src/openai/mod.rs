//! OpenAI adapters for the search capabilities.
//!
//! - [`OpenAiEmbedder`]: query embeddings via `/v1/embeddings`
//! - [`OpenAiRelevanceJudge`]: relevance passes via `/v1/chat/completions`
//!   in JSON mode

pub mod embeddings;
pub mod relevance;

pub use embeddings::OpenAiEmbedder;
pub use relevance::OpenAiRelevanceJudge;

use std::time::Duration;

use crate::error::{OidmError, Result};

/// User-Agent sent to the model provider.
pub const USER_AGENT: &str = concat!("oidm/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the OpenAI adapters.
///
/// # Errors
///
/// Returns [`OidmError::Http`] if the client cannot be constructed.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| OidmError::Http(format!("failed to build OpenAI client: {e}")))
}

/// Join the base URL and an API path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Describe a failed HTTP response, preferring the API's own message.
pub(crate) fn describe_http_error(status: reqwest::StatusCode, body: &str) -> String {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 => format!("OpenAI authentication failed: {message}"),
        429 => format!("OpenAI rate limited: {message}"),
        code => format!("OpenAI HTTP {code}: {message}"),
    }
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
