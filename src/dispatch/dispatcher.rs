//! Tool-call dispatch: route, resolve, validate, invoke, record, respond.
//!
//! Every call that reaches a provider ends in a [`ToolCallResult`]; only a
//! tool name that parses to no route is returned as `Err`, since that is a
//! protocol-level mistake rather than a provider failure.
//!
//! ```text
//! call_tool("use_ollama", {model: "fast", prompt: "hi"})
//!     │ ToolRoute::parse           ──✗──► Err(UnknownTool)
//!     │ registry.get("ollama")     ──✗──► error result, nothing recorded
//!     │ alias "fast" → "qwen2.5:7b"
//!     │ validation                 ──✗──► error result, recorded
//!     │ execute (retries inside one timeout)
//!     │ history.record(entry)      (once, whatever the outcome)
//!     ▼
//! ToolCallResult { text | error }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::route::ToolRoute;
use crate::history::{HistoryEntry, HistoryLedger};
use crate::providers::registry::ProviderRegistry;
use crate::providers::retry::{RetryConfig, with_retry_within};
use crate::providers::traits::Provider;
use crate::telemetry;
use crate::types::{
    DURATION_MS, InferenceRequest, InferenceResponse, TRUNCATED, ToolCallResult, ToolDescriptor,
    Usage,
};
use crate::validation::{self, Limits};
use crate::{BifrostError, Result};

/// Default cap on returned text, in chars.
pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 1_000_000;

/// Turns protocol tool calls into provider calls.
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    history: Arc<HistoryLedger>,
    limits: Limits,
    max_response_length: usize,
    retry: RetryConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, history: Arc<HistoryLedger>) -> Self {
        Self {
            registry,
            history,
            limits: Limits::default(),
            max_response_length: DEFAULT_MAX_RESPONSE_LENGTH,
            retry: RetryConfig::default(),
        }
    }

    /// Set prompt/system length limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the response text cap.
    #[must_use]
    pub fn with_max_response_length(mut self, max: usize) -> Self {
        self.max_response_length = max;
        self
    }

    /// Set the backoff curve; attempts still come from each provider's budget.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryLedger> {
        &self.history
    }

    /// Current tool surface.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.tool_descriptors().await
    }

    /// Dispatch one tool call.
    ///
    /// Returns `Err` only for [`BifrostError::UnknownTool`]; every other
    /// failure is an error-flagged [`ToolCallResult`].
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolCallResult> {
        let route = ToolRoute::parse(name)?;
        Ok(self.dispatch(&route, arguments).await)
    }

    /// Dispatch an already-parsed route.
    pub async fn dispatch(&self, route: &ToolRoute, arguments: &Value) -> ToolCallResult {
        let Some(provider) = self.registry.get(route.provider()) else {
            let err = BifrostError::ProviderNotFound(route.provider().to_string());
            warn!(tool = %route, "no such provider");
            return ToolCallResult::error(err.to_string());
        };
        match route {
            ToolRoute::Invoke(_) => self.invoke(provider.as_ref(), arguments).await,
            ToolRoute::ListModels(_) => self.list_models(provider.as_ref()).await,
        }
    }

    #[instrument(skip_all, fields(provider = provider.name()))]
    async fn list_models(&self, provider: &dyn Provider) -> ToolCallResult {
        let settings = provider.settings();
        let start = Instant::now();
        let result = with_retry_within(
            &self.retry.for_budget(settings.max_retries),
            settings.timeout_ms,
            provider.name(),
            "list_models",
            || catch_panics(provider.name(), provider.list_models()),
        )
        .await;
        record_request("list_models", provider.name(), start, result.is_ok());

        match result {
            Ok(models) => {
                debug!(count = models.len(), "listed models");
                ToolCallResult::text(models.join("\n"))
            }
            Err(e) => {
                warn!(error = %e, "model listing failed");
                ToolCallResult::error(e.to_string())
            }
        }
    }

    #[instrument(skip_all, fields(provider = provider.name()))]
    async fn invoke(&self, provider: &dyn Provider, arguments: &Value) -> ToolCallResult {
        let start = Instant::now();
        let (request, outcome) = match self.prepare_request(provider, arguments) {
            Ok(request) => {
                let outcome = self.execute(provider, &request, start).await;
                (request, outcome)
            }
            Err(e) => {
                debug!(error = %e, "rejected before reaching provider");
                (snapshot_arguments(provider, arguments), Err(e))
            }
        };
        let duration_ms = elapsed_ms(start);
        record_request("invoke", provider.name(), start, outcome.is_ok());

        let entry = HistoryEntry::new(provider.name(), &request, &outcome, duration_ms);
        if let Err(e) = self.history.record(entry).await {
            metrics::counter!(telemetry::HISTORY_WRITE_FAILURES_TOTAL).increment(1);
            warn!(error = %e, "failed to persist history entry");
        }

        match outcome {
            Ok(response) => ToolCallResult::text(response.text),
            Err(e) => {
                warn!(model = %request.model, error = %e, "invoke failed");
                ToolCallResult::error(e.to_string())
            }
        }
    }

    /// Extract, alias-resolve and validate invoke arguments.
    fn prepare_request(&self, provider: &dyn Provider, arguments: &Value) -> Result<InferenceRequest> {
        let args = InvokeArguments::from_value(arguments)?;

        let model = match args.model {
            Some(model) => provider.resolve_model(&model),
            None => provider
                .default_model()
                .map(|m| provider.resolve_model(m))
                .ok_or_else(|| BifrostError::Validation("model must be a non-empty string".into()))?,
        };
        let prompt = args
            .prompt
            .ok_or_else(|| BifrostError::Validation("prompt must be a non-empty string".into()))?;

        let mut request = InferenceRequest {
            model,
            prompt,
            system: args.system,
            temperature: args.temperature,
            max_tokens: None,
        };
        validation::validate_request(&request, &self.limits)?;
        request.max_tokens = validation::validate_max_tokens(args.max_tokens)?;
        Ok(request)
    }

    async fn execute(
        &self,
        provider: &dyn Provider,
        request: &InferenceRequest,
        start: Instant,
    ) -> Result<InferenceResponse> {
        let settings = provider.settings();
        let mut response = with_retry_within(
            &self.retry.for_budget(settings.max_retries),
            settings.timeout_ms,
            provider.name(),
            "invoke",
            || catch_panics(provider.name(), provider.execute(request)),
        )
        .await?;

        // empty completions are treated as backend failures
        if response.text.is_empty() {
            return Err(BifrostError::provider(
                provider.name(),
                "provider returned an empty response",
            ));
        }
        if response.model.is_empty() {
            response.model = request.model.clone();
        }
        if let Some(usage) = &response.usage {
            record_token_usage(provider.name(), usage);
        }

        let char_count = response.text.chars().count();
        if char_count > self.max_response_length {
            warn!(
                length = char_count,
                limit = self.max_response_length,
                "truncating response"
            );
            response.text = response.text.chars().take(self.max_response_length).collect();
            response
                .metadata
                .insert(TRUNCATED.to_string(), Value::Bool(true));
        }
        response
            .metadata
            .insert(DURATION_MS.to_string(), Value::from(elapsed_ms(start)));
        Ok(response)
    }
}

/// Raw invoke arguments with JSON types checked but values unvalidated.
#[derive(Debug, Default)]
struct InvokeArguments {
    model: Option<String>,
    prompt: Option<String>,
    system: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<f64>,
}

impl InvokeArguments {
    fn from_value(arguments: &Value) -> Result<Self> {
        let map = match arguments {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            _ => {
                return Err(BifrostError::Validation(
                    "arguments must be an object".into(),
                ));
            }
        };
        Ok(Self {
            model: optional_string(map.get("model"), "model")?,
            prompt: optional_string(map.get("prompt"), "prompt")?,
            system: optional_string(map.get("system"), "system")?,
            temperature: optional_number(map.get("temperature"), "temperature")?,
            max_tokens: optional_number(
                map.get("max_tokens").or_else(|| map.get("maxTokens")),
                "max_tokens",
            )?,
        })
    }
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(BifrostError::Validation(format!("{field} must be a string"))),
    }
}

fn optional_number(value: Option<&Value>, field: &str) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(BifrostError::Validation(format!("{field} must be a number"))),
    }
}

/// Best-effort request snapshot for calls rejected before validation passed.
fn snapshot_arguments(provider: &dyn Provider, arguments: &Value) -> InferenceRequest {
    let text = |key: &str| arguments.get(key).and_then(Value::as_str).map(str::to_string);
    let model = text("model")
        .or_else(|| provider.default_model().map(str::to_string))
        .map(|m| provider.resolve_model(&m))
        .unwrap_or_default();
    InferenceRequest {
        model,
        prompt: text("prompt").unwrap_or_default(),
        system: text("system"),
        ..Default::default()
    }
}

/// Turn a panic inside one provider attempt into a permanent `Provider` error.
async fn catch_panics<T>(provider: &str, attempt: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            error!(provider, panic = %detail, "provider panicked");
            Err(BifrostError::provider(
                provider,
                format!("provider panicked: {detail}"),
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn record_request(operation: &'static str, provider: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
        "operation" => operation,
    )
    .record(start.elapsed().as_secs_f64());
}

fn record_token_usage(provider: &str, usage: &Usage) {
    if let Some(prompt) = usage.prompt_tokens {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "prompt",
        )
        .increment(u64::from(prompt));
    }
    if let Some(completion) = usage.completion_tokens {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "completion",
        )
        .increment(u64::from(completion));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_reject_wrong_types() {
        let err = InvokeArguments::from_value(&json!({"prompt": 5})).unwrap_err();
        assert!(err.to_string().contains("prompt must be a string"));

        let err = InvokeArguments::from_value(&json!({"temperature": "hot"})).unwrap_err();
        assert!(err.to_string().contains("temperature must be a number"));

        assert!(InvokeArguments::from_value(&json!(["a"])).is_err());
    }

    #[test]
    fn arguments_accept_null_and_camel_case_tokens() {
        let args = InvokeArguments::from_value(&Value::Null).unwrap();
        assert!(args.prompt.is_none());

        let args = InvokeArguments::from_value(&json!({"maxTokens": 64, "system": null})).unwrap();
        assert_eq!(args.max_tokens, Some(64.0));
        assert!(args.system.is_none());
    }
}
