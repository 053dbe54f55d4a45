//! HTTP plumbing shared by the adapters.
//!
//! One request/response pair per turn. Non-2xx statuses and network failures
//! become errors here so no adapter can mistake them for an empty answer.

use std::time::Duration;

use reel_core::{AgentError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

/// Build a client with the adapter's request timeout
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))
}

/// `base` without trailing slashes, joined with `path`
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a JSON request and decode the JSON response body
pub(crate) async fn send_json(provider: &str, request: RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider, status = status.as_u16(), "Provider returned an error status");
        return Err(status_to_error(provider, status, &body));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| AgentError::Parse(format!("{provider} returned a body that is not JSON: {e}")))
}

fn transport_error(provider: &str, err: &reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::ProviderUnavailable(format!("{provider} did not answer in time: {err}"))
    } else {
        AgentError::ProviderUnavailable(format!("could not reach {provider}: {err}"))
    }
}

/// Map an error status onto the error taxonomy
pub(crate) fn status_to_error(provider: &str, status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{provider} returned HTTP {}: {}", status.as_u16(), error_detail(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        _ => AgentError::Provider(detail),
    }
}

/// Pull `error.message` (or `error` as a string) out of a JSON error body
fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| v.get("error").and_then(Value::as_str))
    });

    match message {
        Some(message) => message.to_string(),
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().to_string(),
    }
}

/// Read a token counter that providers report as a JSON number
pub(crate) fn count(value: &Value, pointer: &str) -> u32 {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}
