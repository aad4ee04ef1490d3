//! Builder for assembling a [`Gateway`].

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::Result;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::history::{HistoryConfig, HistoryLedger};
use crate::providers::{Provider, ProviderRegistry, RetryConfig, registry_from_config};
use crate::types::{ToolCallResult, ToolDescriptor};

/// Main entry point for creating gateway instances.
pub struct Bifrost;

impl Bifrost {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> BifrostBuilder {
        BifrostBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// ```rust,no_run
/// use bifrost::{Bifrost, Config};
///
/// # async fn run() -> bifrost::Result<()> {
/// let gateway = Bifrost::builder()
///     .config(Config::load(None)?)
///     .build()
///     .await?;
/// for tool in gateway.list_tools().await {
///     println!("{}", tool.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct BifrostBuilder {
    config: Config,
    providers: Vec<Arc<dyn Provider>>,
    retry: Option<RetryConfig>,
    history: Option<HistoryLedger>,
}

impl BifrostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration for providers, limits and history.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Register an extra provider after the configured ones.
    ///
    /// A provider with the same name as a configured one replaces it.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Override the retry backoff curve.
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Use a pre-built history ledger instead of one derived from config.
    pub fn history(mut self, ledger: HistoryLedger) -> Self {
        self.history = Some(ledger);
        self
    }

    /// Build providers, open the history ledger and wire the dispatcher.
    ///
    /// Individual providers that fail to build are skipped with a warning.
    /// Fails only when the history file exists but cannot be read.
    pub async fn build(self) -> Result<Gateway> {
        let mut registry: ProviderRegistry = registry_from_config(&self.config);
        for provider in self.providers {
            registry.register(provider);
        }
        let registry = Arc::new(registry);

        let history = match self.history {
            Some(ledger) => ledger,
            None => HistoryLedger::open(HistoryConfig::from(&self.config.server)).await?,
        };
        let history = Arc::new(history);

        let mut dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&history))
            .with_limits(self.config.security.limits())
            .with_max_response_length(self.config.security.max_response_length);
        if let Some(retry) = self.retry {
            dispatcher = dispatcher.with_retry_config(retry);
        }

        info!(
            providers = registry.len(),
            history = history.is_enabled(),
            "gateway ready"
        );
        Ok(Gateway {
            registry,
            history,
            dispatcher,
        })
    }
}

/// Assembled gateway: registry, history ledger and dispatcher.
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    history: Arc<HistoryLedger>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryLedger> {
        &self.history
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Health-check every provider; see [`ProviderRegistry::initialize_all`].
    pub async fn initialize_all(&self) -> std::collections::BTreeMap<String, bool> {
        self.registry.initialize_all().await
    }

    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.dispatcher.list_tools().await
    }

    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolCallResult> {
        self.dispatcher.call_tool(name, arguments).await
    }
}
