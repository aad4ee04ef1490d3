//! Shared test doubles.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use bifrost::{
    BifrostError, Capabilities, InferenceRequest, InferenceResponse, Provider, ProviderSettings,
    Result,
};

type Handler = Box<dyn Fn(u32, &InferenceRequest) -> Result<InferenceResponse> + Send + Sync>;

/// Scriptable in-process provider.
///
/// By default echoes the prompt and lists `["m1"]`.
pub struct MockProvider {
    name: String,
    capabilities: Capabilities,
    settings: ProviderSettings,
    models: Option<Vec<String>>,
    handler: Handler,
    delay: Option<Duration>,
    healthy: bool,
    calls: AtomicU32,
    seen: Mutex<Vec<InferenceRequest>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::text_only().with_system_prompt(),
            settings: ProviderSettings::default(),
            models: Some(vec!["m1".to_string()]),
            handler: Box::new(|_, req| {
                Ok(InferenceResponse::new(format!("echo: {}", req.prompt), &req.model))
            }),
            delay: None,
            healthy: true,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        self.settings
            .aliases
            .insert(alias.to_string(), target.to_string());
        self
    }

    pub fn models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn unreachable_models(mut self) -> Self {
        self.models = None;
        self
    }

    pub fn default_model(mut self, model: &str) -> Self {
        self.settings.default_model = Some(model.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.settings.enabled = false;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.settings.timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.settings.max_retries = n;
        self
    }

    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities = caps;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always answer with `text`.
    pub fn reply(self, text: &str) -> Self {
        let text = text.to_string();
        self.handler(move |_, req| Ok(InferenceResponse::new(text.clone(), &req.model)))
    }

    /// Always fail with the error built by `make`.
    pub fn fail_with(self, make: fn() -> BifrostError) -> Self {
        self.handler(move |_, _| Err(make()))
    }

    /// Receives the zero-based call number and the request.
    pub fn handler(
        mut self,
        f: impl Fn(u32, &InferenceRequest) -> Result<InferenceResponse> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Box::new(f);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        match &self.models {
            Some(models) => Ok(self.settings.merge_aliases(models.clone())),
            None => Err(BifrostError::Network {
                message: "connection refused".into(),
                status: None,
                url: None,
            }),
        }
    }

    async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(call, request)
    }

    async fn validate_config(&self) -> bool {
        self.healthy
    }
}
