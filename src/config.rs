//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.bifrost/config.toml` (user)
//! 3. `/etc/bifrost/config.toml` (system)
//! 4. built-in defaults
//!
//! Keys are camelCase (`logLevel`, `historyMaxEntries`, `baseUrl`, ...).
//! API keys may be given inline or through the provider's environment
//! variable (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::validation::Limits;
use crate::{BifrostError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider sections keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Default tracing filter (default: "info"). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Record invoke calls in the history ledger (default: true).
    #[serde(default = "default_true")]
    pub history_enabled: bool,
    /// JSON-lines file backing the ledger. `~/` is expanded.
    #[serde(default)]
    pub history_file: Option<String>,
    /// In-memory ledger bound, also the rehydration tail length (default: 1000).
    #[serde(default = "default_history_max")]
    pub history_max_entries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            history_enabled: true,
            history_file: None,
            history_max_entries: default_history_max(),
        }
    }
}

impl ServerConfig {
    /// History file path with a leading `~/` expanded to the home directory.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.as_deref().map(expand_home)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_history_max() -> usize {
    1000
}

/// Settings for one provider section.
///
/// Common fields apply to every backend; `baseUrl`, `apiKey` and `cliPath`
/// are only read by the backends that need them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Backend implementation. Defaults to the section name.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-call timeout in milliseconds (default: 120000).
    #[serde(default = "default_provider_timeout")]
    pub timeout: u64,
    /// Retries for transient failures (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Alias → real model identifier.
    #[serde(default)]
    pub models: BTreeMap<String, String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub cli_path: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: None,
            enabled: true,
            timeout: default_provider_timeout(),
            max_retries: default_max_retries(),
            base_url: None,
            models: BTreeMap::new(),
            api_key: None,
            default_model: None,
            cli_path: None,
        }
    }
}

fn default_provider_timeout() -> u64 {
    120_000
}

fn default_max_retries() -> u32 {
    2
}

/// Backend kind → environment variable holding its API key.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
];

impl ProviderConfig {
    /// Backend kind for a section named `name`.
    pub fn kind_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }

    /// API key from the section, falling back to the kind's environment variable.
    pub fn resolved_api_key(&self, kind: &str) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                PROVIDER_ENV_VARS
                    .iter()
                    .find(|(name, _)| *name == kind)
                    .and_then(|(_, var)| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Reject values no backend could run with.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.timeout == 0 {
            return Err(BifrostError::Configuration(format!(
                "provider '{name}': timeout must be a positive number of milliseconds"
            )));
        }
        if let Some((alias, _)) = self.models.iter().find(|(_, target)| target.trim().is_empty())
        {
            return Err(BifrostError::Configuration(format!(
                "provider '{name}': model alias '{alias}' maps to an empty identifier"
            )));
        }
        Ok(())
    }
}

/// Input/output bounds shared by every provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    #[serde(default = "default_max_prompt")]
    pub max_prompt_length: usize,
    #[serde(default = "default_max_system")]
    pub max_system_prompt_length: usize,
    #[serde(default = "default_max_response")]
    pub max_response_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_prompt_length: default_max_prompt(),
            max_system_prompt_length: default_max_system(),
            max_response_length: default_max_response(),
        }
    }
}

impl SecurityConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_prompt_length: self.max_prompt_length,
            max_system_prompt_length: self.max_system_prompt_length,
        }
    }
}

fn default_max_prompt() -> usize {
    100_000
}

fn default_max_system() -> usize {
    10_000
}

fn default_max_response() -> usize {
    1_000_000
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.bifrost/config.toml` and `/etc/bifrost/config.toml` that exists is
    /// used; if neither does, defaults apply.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BifrostError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            BifrostError::Configuration(msg) => {
                BifrostError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BifrostError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(BifrostError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bifrost").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/bifrost/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
