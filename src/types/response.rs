//! Inference response types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the call's wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "durationMs";

/// Metadata key set when response text was cut to the configured limit.
pub const TRUNCATED: &str = "truncated";

/// Result of one successful [`Provider::execute`](crate::providers::Provider::execute) call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResponse {
    pub text: String,
    /// Resolved model identifier, never an alias.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl InferenceResponse {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Call duration recorded by the dispatcher, if present.
    pub fn duration_ms(&self) -> Option<u64> {
        self.metadata.get(DURATION_MS).and_then(|v| v.as_u64())
    }
}

/// Token usage statistics.
///
/// Every field is optional because not every backend reports all three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

impl Usage {
    /// Build usage from prompt/completion counts, deriving the total when both are known.
    pub fn from_counts(prompt: Option<u32>, completion: Option<u32>) -> Self {
        let total = match (prompt, completion) {
            (Some(p), Some(c)) => Some(p.saturating_add(c)),
            _ => None,
        };
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        }
    }
}
