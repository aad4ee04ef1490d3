//! Build provider instances from configuration sections.
//!
//! Each `[providers.<name>]` section yields one provider whose backend is
//! chosen by `kind` (default: the section name). A section that fails to
//! build is logged and skipped; the rest still register.

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::ProviderRegistry;
use super::traits::Provider;
use crate::config::{Config, ProviderConfig};
use crate::validation::validate_provider_name;
use crate::{BifrostError, Result};

/// Backend kinds this crate knows about, whether or not compiled in.
pub const KNOWN_KINDS: &[&str] = &["ollama", "openai", "anthropic", "gemini"];

/// Construct one provider.
///
/// Fails with `Configuration` for an invalid name, an unknown kind, a kind
/// whose cargo feature is compiled out, or backend-specific config errors.
pub fn build_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    validate_provider_name(name)?;
    config.validate(name)?;
    let kind = config.kind_or(name);
    debug!(provider = name, kind, "building provider");

    match kind {
        #[cfg(feature = "ollama")]
        "ollama" => Ok(Arc::new(super::ollama::OllamaProvider::new(name, config)?)),
        #[cfg(feature = "openai")]
        "openai" => Ok(Arc::new(super::openai::OpenAiProvider::new(name, config)?)),
        #[cfg(feature = "anthropic")]
        "anthropic" => Ok(Arc::new(super::anthropic::AnthropicProvider::new(
            name, config,
        )?)),
        #[cfg(feature = "gemini")]
        "gemini" => Ok(Arc::new(super::gemini::GeminiCliProvider::new(
            name, config,
        )?)),
        other if KNOWN_KINDS.contains(&other) => Err(BifrostError::Configuration(format!(
            "provider '{name}': backend '{other}' was not compiled in (enable the '{other}' feature)"
        ))),
        other => Err(BifrostError::Configuration(format!(
            "provider '{name}': unknown backend kind '{other}'"
        ))),
    }
}

/// Build a registry from every configured provider section.
pub fn registry_from_config(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (name, section) in &config.providers {
        if !section.enabled {
            debug!(provider = %name, "provider disabled in config");
            continue;
        }
        match build_provider(name, section) {
            Ok(provider) => registry.register(provider),
            Err(e) => warn!(provider = %name, error = %e, "skipping provider"),
        }
    }
    registry
}
