//! OpenAI-compatible chat completions backend.
//!
//! Speaks the `/models` + `/chat/completions` dialect, so the same client
//! serves OpenAI itself and local servers exposing that API (LM Studio,
//! vLLM, llama.cpp server) via `kind = "openai"` and a custom `baseUrl`.

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

/// Default OpenAI API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    name: String,
    settings: ProviderSettings,
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl OpenAiProvider {
    /// Build from config. An API key is mandatory only against the
    /// default OpenAI endpoint.
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let name = name.into();
        let settings = ProviderSettings::from(config);
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let api_key = config.resolved_api_key("openai");
        if api_key.is_none() && base_url == DEFAULT_BASE_URL {
            return Err(BifrostError::Configuration(format!(
                "provider '{name}': apiKey is required (or set OPENAI_API_KEY)"
            )));
        }
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
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.http.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout()))?;
        let response = check_status(&self.name, response).await?;
        let models: ModelsResponse = read_json(&self.name, response).await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .authorize(self.http.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout()))?;
        let response = check_status(&self.name, response).await?;
        let completion: ChatResponse = read_json(&self.name, response).await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BifrostError::provider(&self.name, "response contained no choices"))?;
        debug!(finish_reason = ?choice.finish_reason, "completion finished");

        let mut result =
            InferenceResponse::new(choice.message.content.unwrap_or_default(), completion.model);
        if let Some(usage) = completion.usage {
            result = result.with_usage(Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }
        Ok(result)
    }

    async fn validate_config(&self) -> bool {
        match self.fetch_models().await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = %self.name, error = %e, "openai health check failed");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}
