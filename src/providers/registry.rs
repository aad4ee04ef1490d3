//! Name-keyed provider registry and tool descriptor generation.
//!
//! The `ProviderRegistry` is filled once by the composition root and shared
//! read-only afterwards. It turns the heterogeneous provider set into a
//! homogeneous tool surface: two tools per provider.
//!
//! ```text
//! registry.tool_descriptors()
//!         │
//!         ├── ollama ── list_models() ──► use_ollama, list_ollama_models
//!         ├── openai ── list_models() ──► use_openai, list_openai_models
//!         └── gemini ── list_models() ✗ ─► use_gemini (no enum), list_gemini_models
//! ```
//!
//! A failing model listing never aborts generation; that provider's invoke
//! tool simply carries no `enum` for `model`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::traits::Provider;
use crate::dispatch::ToolRoute;
use crate::types::ToolDescriptor;
use crate::validation::validate_provider_name;

/// Registry of enabled providers, keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its name.
    ///
    /// Disabled providers and providers whose name could not be routed back
    /// from a tool name are dropped here and stay invisible. A provider with
    /// an already-registered name replaces the earlier one.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        if let Err(e) = validate_provider_name(&name) {
            warn!(provider = %name, error = %e, "skipping provider with invalid name");
            return;
        }
        if !provider.is_enabled() {
            debug!(provider = %name, "skipping disabled provider");
            return;
        }
        if self.providers.insert(name.clone(), provider).is_some() {
            debug!(provider = %name, "replaced previously registered provider");
        } else {
            info!(provider = %name, "registered provider");
        }
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Names of all registered providers.
    pub fn names(&self) -> BTreeSet<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterate registered providers in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    /// Health-check every provider's configuration.
    ///
    /// Health checks run concurrently, each on its own task, so a panicking health check
    /// is recorded as `false` without affecting the others.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn initialize_all(&self) -> BTreeMap<String, bool> {
        let checks = self.providers.iter().map(|(name, provider)| {
            let name = name.clone();
            let provider = Arc::clone(provider);
            async move {
                let ok = match tokio::spawn(async move { provider.validate_config().await }).await
                {
                    Ok(ok) => ok,
                    Err(e) => {
                        warn!(provider = %name, error = %e, "health check crashed");
                        false
                    }
                };
                if ok {
                    info!(provider = %name, "provider ready");
                } else {
                    warn!(provider = %name, "provider failed health check");
                }
                (name, ok)
            }
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Generate the tool surface: `use_<name>` and `list_<name>_models` per provider.
    ///
    /// Model lists are fetched concurrently and best-effort; each fetch is
    /// bounded by the provider's timeout.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        let listings = self.providers.values().map(|provider| async move {
            let models = match tokio::time::timeout(
                provider.settings().timeout(),
                provider.list_models(),
            )
            .await
            {
                Ok(Ok(models)) => models,
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "model listing failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(provider = provider.name(), "model listing timed out");
                    Vec::new()
                }
            };
            descriptors_for(provider.as_ref(), &models)
        });
        join_all(listings).await.into_iter().flatten().collect()
    }
}

/// Build the two descriptors for one provider given its model list.
pub fn descriptors_for(provider: &dyn Provider, models: &[String]) -> [ToolDescriptor; 2] {
    let name = provider.name();
    let caps = provider.capabilities();

    let mut model = Map::new();
    model.insert("type".into(), json!("string"));
    model.insert(
        "description".into(),
        json!(format!("Model to use with {name}")),
    );
    if !models.is_empty() {
        model.insert("enum".into(), json!(models));
    }

    let mut properties = Map::new();
    properties.insert("model".into(), Value::Object(model));
    properties.insert(
        "prompt".into(),
        json!({
            "type": "string",
            "description": "The prompt to send to the model",
        }),
    );
    if caps.supports_system_prompt {
        properties.insert(
            "system".into(),
            json!({
                "type": "string",
                "description": "Optional system prompt",
            }),
        );
    }
    properties.insert(
        "temperature".into(),
        json!({
            "type": "number",
            "description": "Sampling temperature (0-2)",
        }),
    );

    let features = caps.describe();
    let description = if features.is_empty() {
        format!("Send a prompt to the {name} provider")
    } else {
        format!("Send a prompt to the {name} provider (supports: {features})")
    };

    [
        ToolDescriptor::new(
            ToolRoute::Invoke(name.to_string()).tool_name(),
            description,
            json!({
                "type": "object",
                "properties": properties,
                "required": ["model", "prompt"],
            }),
        ),
        ToolDescriptor::new(
            ToolRoute::ListModels(name.to_string()).tool_name(),
            format!("List models available from the {name} provider"),
            json!({
                "type": "object",
                "properties": {},
            }),
        ),
    ]
}
