//! Gemini backend driven through the `gemini` command-line tool.
//!
//! Each call spawns `<cliPath> -m <model> -p <prompt>` and returns stdout.
//! The CLI has no model discovery, so the model list is a built-in set plus
//! the configured default model and aliases.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::traits::{Provider, ProviderSettings};
use crate::config::ProviderConfig;
use crate::types::{Capabilities, InferenceRequest, InferenceResponse};
use crate::validation::ensure_model_available;
use crate::{BifrostError, Result};

pub const DEFAULT_CLI_PATH: &str = "gemini";

/// Models the CLI accepts out of the box.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.5-flash-lite"];

/// Stderr excerpt kept in error messages, in chars.
const MAX_STDERR: usize = 500;

pub struct GeminiCliProvider {
    name: String,
    settings: ProviderSettings,
    /// Resolved executable.
    cli_path: PathBuf,
    /// Passed to the CLI as `GEMINI_API_KEY` when configured.
    api_key: Option<String>,
}

impl GeminiCliProvider {
    /// Fails with `Configuration` when the CLI cannot be found, either at
    /// the configured path or on `PATH`.
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self> {
        let name = name.into();
        let requested = config
            .cli_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_CLI_PATH);
        let cli_path = which::which(requested).map_err(|e| {
            BifrostError::Configuration(format!(
                "provider '{name}': gemini CLI '{requested}' not found: {e}"
            ))
        })?;
        debug!(provider = %name, cli = %cli_path.display(), "resolved gemini CLI");
        Ok(Self {
            name,
            settings: ProviderSettings::from(config),
            cli_path,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    /// Real model identifiers this provider accepts.
    fn known_models(&self) -> Vec<String> {
        let mut models: Vec<String> = DEFAULT_MODELS.iter().map(|m| m.to_string()).collect();
        if let Some(default) = &self.settings.default_model {
            let resolved = self.settings.resolve_alias(default);
            if !models.contains(&resolved) {
                models.push(resolved);
            }
        }
        for target in self.settings.aliases.values() {
            if !models.contains(target) {
                models.push(target.clone());
            }
        }
        models
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &self.api_key {
            cmd.env("GEMINI_API_KEY", key);
        }
        cmd
    }

    async fn run(&self, cmd: &mut Command) -> Result<String> {
        let output = cmd.output().await.map_err(|e| {
            BifrostError::provider(
                &self.name,
                format!("failed to start '{}': {e}", self.cli_path.display()),
            )
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail: String = stderr.trim().chars().take(MAX_STDERR).collect();
            return Err(BifrostError::provider(
                &self.name,
                format!(
                    "'{}' exited with {}: {detail}",
                    self.cli_path.display(),
                    output.status
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Provider for GeminiCliProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::text_only().with_images()
    }

    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.settings.merge_aliases(self.known_models()))
    }

    #[instrument(skip_all, fields(provider = %self.name, model = %request.model))]
    async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        ensure_model_available(&request.model, &self.known_models())?;
        if request.system.is_some() || request.temperature.is_some() || request.max_tokens.is_some()
        {
            debug!("cli ignores system prompt, temperature and token limit");
        }

        let mut cmd = self.command();
        cmd.arg("-m").arg(&request.model).arg("-p").arg(&request.prompt);
        let text = self.run(&mut cmd).await?;
        Ok(InferenceResponse::new(text, request.model.clone()))
    }

    async fn validate_config(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("--version");
        match self.run(&mut cmd).await {
            Ok(version) => {
                debug!(provider = %self.name, %version, "gemini cli available");
                true
            }
            Err(e) => {
                debug!(provider = %self.name, error = %e, "gemini cli health check failed");
                false
            }
        }
    }
}
