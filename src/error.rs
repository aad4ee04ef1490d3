//! Bifrost error types

use std::time::Duration;

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    // Caller input errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Backend errors
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        status: Option<u16>,
        url: Option<String>,
    },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimit { retry_after: Option<Duration> },

    // Routing errors
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Tool name matches neither `use_<provider>` nor `list_<provider>_models`.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BifrostError {
    /// Shorthand for a [`BifrostError::Provider`] error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures, 5xx responses and throttling are transient.
    /// Timeouts are not: the caller already waited the full budget once.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Network { status: None, .. } => true,
            Self::Network {
                status: Some(code), ..
            } => *code >= 500,
            _ => false,
        }
    }

    /// Backoff hint carried by a [`BifrostError::RateLimit`].
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_budget() {
        let err = BifrostError::Timeout { timeout_ms: 120_000 };
        assert_eq!(err.to_string(), "Request timed out after 120000ms");
    }

    #[test]
    fn provider_not_found_message() {
        let err = BifrostError::ProviderNotFound("openai".into());
        assert_eq!(err.to_string(), "Provider not found: openai");
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = BifrostError::Network {
            message: "bad gateway".into(),
            status: Some(502),
            url: None,
        };
        let client = BifrostError::Network {
            message: "gone".into(),
            status: Some(410),
            url: None,
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!BifrostError::Timeout { timeout_ms: 1 }.is_transient());
        assert!(!BifrostError::Validation("x".into()).is_transient());
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let err = BifrostError::RateLimit {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(BifrostError::Authentication("no".into()).retry_after(), None);
    }
}
