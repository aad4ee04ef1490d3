//! History entry snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{InferenceRequest, InferenceResponse, Usage};

/// Immutable record of one invoke call.
///
/// Persisted as one JSON object per line. Exactly one of `response` /
/// `error` is present; lines carrying both or neither fail to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredEntry", try_from = "StoredEntry")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub request: RequestSnapshot,
    pub outcome: Outcome,
}

/// On-disk shape of a [`HistoryEntry`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    timestamp: DateTime<Utc>,
    provider: String,
    model: String,
    request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<HistoryEntry> for StoredEntry {
    fn from(entry: HistoryEntry) -> Self {
        let (response, error) = match entry.outcome {
            Outcome::Response(r) => (Some(r), None),
            Outcome::Error(e) => (None, Some(e)),
        };
        Self {
            timestamp: entry.timestamp,
            provider: entry.provider,
            model: entry.model,
            request: entry.request,
            response,
            error,
        }
    }
}

impl TryFrom<StoredEntry> for HistoryEntry {
    type Error = String;

    fn try_from(stored: StoredEntry) -> std::result::Result<Self, Self::Error> {
        let outcome = match (stored.response, stored.error) {
            (Some(r), None) => Outcome::Response(r),
            (None, Some(e)) => Outcome::Error(e),
            (Some(_), Some(_)) => return Err("entry has both response and error".into()),
            (None, None) => return Err("entry has neither response nor error".into()),
        };
        Ok(Self {
            timestamp: stored.timestamp,
            provider: stored.provider,
            model: stored.model,
            request: stored.request,
            outcome,
        })
    }
}

/// The request fields worth keeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// What came back from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub duration_ms: u64,
}

/// Exactly one of a response or an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Response(ResponseSnapshot),
    Error(String),
}

impl HistoryEntry {
    /// Snapshot a finished call, timestamped now.
    pub fn new(
        provider: impl Into<String>,
        request: &InferenceRequest,
        outcome: &Result<InferenceResponse>,
        duration_ms: u64,
    ) -> Self {
        let outcome = match outcome {
            Ok(response) => Outcome::Response(ResponseSnapshot {
                text: response.text.clone(),
                usage: response.usage,
                duration_ms: response.duration_ms().unwrap_or(duration_ms),
            }),
            Err(e) => Outcome::Error(e.to_string()),
        };
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            model: request.model.clone(),
            request: RequestSnapshot {
                prompt: request.prompt.clone(),
                system: request.system.clone(),
            },
            outcome,
        }
    }

    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match &self.outcome {
            Outcome::Response(r) => Some(r),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Response(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}
