//! The capability contract every provider backend implements.
//!
//! The registry and dispatcher only ever hold `Arc<dyn Provider>` and select
//! providers by name. Everything backend-specific (HTTP shapes, CLI flags,
//! credential handling, model discovery) lives behind this trait.
//!
//! # Error contract for `execute`
//!
//! - `Validation` for malformed arguments the backend detects itself
//!   (including a model missing from its live model list)
//! - `Authentication` when credentials are rejected
//! - `Timeout` when the call exceeds the configured timeout
//! - `Network` for transport failures
//! - `RateLimit` when the backend throttles
//! - `Provider` for anything else the backend reports

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::config::ProviderConfig;
use crate::types::{Capabilities, InferenceRequest, InferenceResponse};

/// Runtime settings shared by all backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries allowed for transient failures.
    pub max_retries: u32,
    /// Alias → real model identifier.
    pub aliases: BTreeMap<String, String>,
    pub default_model: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for ProviderSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            enabled: config.enabled,
            timeout_ms: config.timeout,
            max_retries: config.max_retries,
            aliases: config.models.clone(),
            default_model: config.default_model.clone(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Map an alias to its backing identifier; unknown names pass through.
    pub fn resolve_alias(&self, model: &str) -> String {
        self.aliases
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_string())
    }

    /// Append alias keys not already present to a discovered model list.
    pub fn merge_aliases(&self, mut models: Vec<String>) -> Vec<String> {
        for alias in self.aliases.keys() {
            if !models.contains(alias) {
                models.push(alias.clone());
            }
        }
        models
    }
}

/// A pluggable inference backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in tool names and history entries.
    fn name(&self) -> &str;

    /// Feature flags used to shape the generated tool schema.
    fn capabilities(&self) -> Capabilities;

    /// Enabled flag, timeout, retry budget and alias map.
    fn settings(&self) -> &ProviderSettings;

    /// Disabled providers are never registered.
    fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    /// Rewrite a caller-facing alias to the backing model identifier.
    fn resolve_model(&self, model: &str) -> String {
        self.settings().resolve_alias(model)
    }

    /// Model used when the caller does not name one.
    fn default_model(&self) -> Option<&str> {
        self.settings().default_model.as_deref()
    }

    /// Currently known model identifiers, aliases included.
    ///
    /// An empty list is not an error.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Perform one inference call.
    async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResponse>;

    /// Reachability and credential check. Must not fail; returns `false` instead.
    async fn validate_config(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_alias() -> ProviderSettings {
        ProviderSettings {
            aliases: BTreeMap::from([("fast".to_string(), "qwen2.5:7b".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn alias_resolves_and_unknown_passes_through() {
        let settings = settings_with_alias();
        assert_eq!(settings.resolve_alias("fast"), "qwen2.5:7b");
        assert_eq!(settings.resolve_alias("llama3"), "llama3");
    }

    #[test]
    fn merge_aliases_skips_duplicates() {
        let settings = settings_with_alias();
        let merged = settings.merge_aliases(vec!["qwen2.5:7b".into(), "fast".into()]);
        assert_eq!(merged, vec!["qwen2.5:7b".to_string(), "fast".to_string()]);

        let merged = settings.merge_aliases(vec!["qwen2.5:7b".into()]);
        assert_eq!(merged, vec!["qwen2.5:7b".to_string(), "fast".to_string()]);
    }

    #[test]
    fn defaults_follow_config_defaults() {
        let settings = ProviderSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.timeout(), Duration::from_secs(120));
        assert_eq!(settings.max_retries, 2);
    }
}
