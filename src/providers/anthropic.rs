//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::http::{build_client, check_status, read_json, transport_error};
use super::traits::{Provider, ProviderSettings};
use crate::config::ProviderConfig;
use crate::types::{Capabilities, InferenceRequest, InferenceResponse, Usage};
use crate::validation::ensure_model_available;
use crate::{BifrostError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Sent as the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for this API; used when the caller gives none.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Page size requested from `GET /v1/models` (the API maximum).
const MODELS_PAGE_LIMIT: &str = "1000";

pub struct AnthropicProvider {
    name: String,
    settings: ProviderSettings,
    base_url: String,
    api_key: String,
    http: Client,
}

impl AnthropicProvider {
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let name = name.into();
        let api_key = config.resolved_api_key("anthropic").ok_or_else(|| {
            BifrostError::Configuration(format!(
                "provider '{name}': apiKey is required (or set ANTHROPIC_API_KEY)"
            ))
        })?;
        let settings = ProviderSettings::from(config);
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            http: build_client(settings.timeout())?,
            name,
            settings,
            base_url,
            api_key,
        })
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    /// Every model id, following `after_id` cursors until `has_more` is false.
    async fn fetch_models(&self) -> Result<Vec<String>> {
        let mut models = Vec::new();
        let mut after_id: Option<String> = None;
        loop {
            let mut request = self
                .authorize(self.http.get(format!("{}/v1/models", self.base_url)))
                .query(&[("limit", MODELS_PAGE_LIMIT)]);
            if let Some(cursor) = &after_id {
                request = request.query(&[("after_id", cursor)]);
            }
            let response = request
                .send()
                .await
                .map_err(|e| transport_error(e, self.timeout()))?;
            let response = check_status(&self.name, response).await?;
            let page: ModelsResponse = read_json(&self.name, response).await?;
            models.extend(page.data.into_iter().map(|m| m.id));

            match page.last_id {
                Some(last) if page.has_more && after_id.as_deref() != Some(last.as_str()) => {
                    after_id = Some(last);
                }
                _ => break,
            }
        }
        debug!(provider = %self.name, count = models.len(), "fetched model pages");
        Ok(models)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.settings.merge_aliases(self.fetch_models().await?))
    }

    #[instrument(skip_all, fields(provider = %self.name, model = %request.model))]
    async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        ensure_model_available(&request.model, &self.fetch_models().await?)?;

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };
        let response = self
            .authorize(self.http.post(format!("{}/v1/messages", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout()))?;
        let response = check_status(&self.name, response).await?;
        let message: MessagesResponse = read_json(&self.name, response).await?;
        debug!(stop_reason = ?message.stop_reason, "message finished");

        let text: String = message
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        let mut result = InferenceResponse::new(text, message.model);
        if let Some(usage) = message.usage {
            result = result.with_usage(Usage::from_counts(usage.input_tokens, usage.output_tokens));
        }
        Ok(result)
    }

    async fn validate_config(&self) -> bool {
        match self.fetch_models().await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = %self.name, error = %e, "anthropic health check failed");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<MessageUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}
