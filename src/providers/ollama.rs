//! Ollama backend over its native REST API.
//!
//! `GET /api/tags` lists locally pulled models; `POST /api/generate` with
//! `stream: false` runs one completion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::http::{build_client, check_status, read_json, transport_error};
use super::traits::{Provider, ProviderSettings};
use crate::Result;
use crate::config::ProviderConfig;
use crate::types::{Capabilities, InferenceRequest, InferenceResponse, Usage};
use crate::validation::ensure_model_available;

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a local or remote Ollama daemon.
pub struct OllamaProvider {
    name: String,
    settings: ProviderSettings,
    base_url: String,
    http: Client,
}

impl OllamaProvider {
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let settings = ProviderSettings::from(config);
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            name: name.into(),
            http: build_client(settings.timeout())?,
            settings,
            base_url,
        })
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    /// Models pulled on the daemon, without aliases.
    async fn fetch_tags(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout()))?;
        let response = check_status(&self.name, response).await?;
        let tags: TagsResponse = read_json(&self.name, response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::text_only()
            .with_system_prompt()
            .with_streaming()
            .with_images()
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.settings.merge_aliases(self.fetch_tags().await?))
    }

    #[instrument(skip_all, fields(provider = %self.name, model = %request.model))]
    async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let available = self.fetch_tags().await?;
        // `llama3` names the same model as the `llama3:latest` tag
        let tagged_latest = available
            .iter()
            .any(|t| t.strip_suffix(":latest") == Some(request.model.as_str()));
        if !tagged_latest {
            ensure_model_available(&request.model, &available)?;
        }

        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout()))?;
        let response = check_status(&self.name, response).await?;
        let generated: GenerateResponse = read_json(&self.name, response).await?;
        debug!(done = generated.done, "generation finished");

        let mut result = InferenceResponse::new(generated.response, generated.model);
        if generated.prompt_eval_count.is_some() || generated.eval_count.is_some() {
            result = result.with_usage(Usage::from_counts(
                generated.prompt_eval_count,
                generated.eval_count,
            ));
        }
        Ok(result)
    }

    async fn validate_config(&self) -> bool {
        match self.fetch_tags().await {
            Ok(models) => {
                debug!(provider = %self.name, models = models.len(), "ollama reachable");
                true
            }
            Err(e) => {
                debug!(provider = %self.name, error = %e, "ollama health check failed");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}
