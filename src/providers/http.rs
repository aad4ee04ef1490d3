//! Shared HTTP plumbing for the REST backends.
//!
//! Maps transport failures and non-success statuses onto [`BifrostError`]
//! so every HTTP backend classifies errors the same way:
//!
//! | status        | error                          |
//! |---------------|--------------------------------|
//! | 401, 403      | `Authentication`               |
//! | 429           | `RateLimit` (with retry-after) |
//! | 400, 422      | `Validation`                   |
//! | 5xx           | `Network` with status          |
//! | other 4xx     | `Provider`                     |

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{BifrostError, Result};

/// Longest error body excerpt carried into an error message, in chars.
const MAX_ERROR_BODY: usize = 500;

/// Build a client whose own timeout matches the provider's budget.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BifrostError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Translate a reqwest transport error.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> BifrostError {
    if err.is_timeout() {
        return BifrostError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };
    }
    BifrostError::Network {
        message: err.to_string(),
        status: err.status().map(|s| s.as_u16()),
        url: err.url().map(ToString::to_string),
    }
}

/// Pass successful responses through; turn everything else into an error.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let retry_after = retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(provider, status, &url, retry_after, &body))
}

/// Decode a JSON body, reporting shape mismatches as provider errors.
pub(crate) async fn read_json<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BifrostError::provider(provider, format!("failed to read response: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BifrostError::provider(provider, format!("unexpected response shape: {e}")))
}

pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    url: &str,
    retry_after: Option<Duration>,
    body: &str,
) -> BifrostError {
    let detail = error_detail(body);
    match status.as_u16() {
        401 | 403 => BifrostError::Authentication(format!("{provider}: {detail}")),
        429 => BifrostError::RateLimit { retry_after },
        400 | 422 => BifrostError::Validation(format!("{provider} rejected the request: {detail}")),
        code if code >= 500 => BifrostError::Network {
            message: format!("{provider} returned {status}: {detail}"),
            status: Some(code),
            url: Some(url.to_string()),
        },
        _ => BifrostError::provider(provider, format!("{status}: {detail}")),
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull a message out of common JSON error envelopes, else the raw body.
fn error_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    let detail = message.unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        return "no details".to_string();
    }
    detail.chars().take(MAX_ERROR_BODY).collect()
}
