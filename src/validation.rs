//! Input validation shared by every provider.
//!
//! All checks are pure and deterministic. They run in the dispatcher before
//! any provider is invoked; a failure is a [`BifrostError::Validation`]
//! naming the offending field and the violated constraint.
//!
//! Lengths are counted in `char`s, not bytes.

use crate::types::InferenceRequest;
use crate::{BifrostError, Result};

/// Lowest accepted temperature.
pub const MIN_TEMPERATURE: f64 = 0.0;
/// Highest accepted temperature.
pub const MAX_TEMPERATURE: f64 = 2.0;
/// Lowest accepted output token limit.
pub const MIN_MAX_TOKENS: u32 = 1;
/// Highest accepted output token limit.
pub const MAX_MAX_TOKENS: u32 = 1_000_000;

/// Length bounds for free-text inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_prompt_length: usize,
    pub max_system_prompt_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_prompt_length: 100_000,
            max_system_prompt_length: 10_000,
        }
    }
}

/// Prompt must be non-empty, NUL-free and at most `max_len` chars.
pub fn validate_prompt(prompt: &str, max_len: usize) -> Result<()> {
    if prompt.is_empty() {
        return Err(invalid("prompt must be a non-empty string"));
    }
    check_text("prompt", prompt, max_len)
}

/// Optional system prompt: NUL-free and at most `max_len` chars.
pub fn validate_system_prompt(system: Option<&str>, max_len: usize) -> Result<()> {
    match system {
        Some(system) => check_text("system", system, max_len),
        None => Ok(()),
    }
}

/// Optional temperature: finite and within `[0, 2]`.
pub fn validate_temperature(temperature: Option<f64>) -> Result<()> {
    let Some(t) = temperature else {
        return Ok(());
    };
    if !t.is_finite() {
        return Err(invalid("temperature must be a finite number"));
    }
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t) {
        return Err(invalid(format!(
            "temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {t}"
        )));
    }
    Ok(())
}

/// Optional output token limit: finite, floored, within `[1, 1_000_000]`.
///
/// Returns the floored value.
pub fn validate_max_tokens(max_tokens: Option<f64>) -> Result<Option<u32>> {
    let Some(n) = max_tokens else {
        return Ok(None);
    };
    if !n.is_finite() {
        return Err(invalid("max_tokens must be a finite number"));
    }
    let floored = n.floor();
    if floored < f64::from(MIN_MAX_TOKENS) || floored > f64::from(MAX_MAX_TOKENS) {
        return Err(invalid(format!(
            "max_tokens must be between {MIN_MAX_TOKENS} and {MAX_MAX_TOKENS}, got {n}"
        )));
    }
    Ok(Some(floored as u32))
}

/// Model identifier must be a non-empty string.
pub fn validate_model(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(invalid("model must be a non-empty string"));
    }
    Ok(())
}

/// Run every request-level check.
pub fn validate_request(request: &InferenceRequest, limits: &Limits) -> Result<()> {
    validate_model(&request.model)?;
    validate_prompt(&request.prompt, limits.max_prompt_length)?;
    validate_system_prompt(request.system.as_deref(), limits.max_system_prompt_length)?;
    validate_temperature(request.temperature)?;
    if let Some(n) = request.max_tokens {
        validate_max_tokens(Some(f64::from(n)))?;
    }
    Ok(())
}

/// Model must appear in the provider's live model list.
///
/// Called by provider implementations, since the allowed set is dynamic
/// per provider.
pub fn ensure_model_available(model: &str, available: &[String]) -> Result<()> {
    if available.iter().any(|m| m == model) {
        return Ok(());
    }
    let listed = if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    };
    Err(invalid(format!(
        "model '{model}' is not available. Available models: {listed}"
    )))
}

/// Provider names become part of tool names, so they are restricted to
/// ASCII alphanumerics, `-` and `_`, and must not end in `_models`.
pub fn validate_provider_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BifrostError::Configuration(
            "provider name must not be empty".into(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BifrostError::Configuration(format!(
            "provider name '{name}' may only contain ASCII letters, digits, '-' and '_'"
        )));
    }
    if name.ends_with("_models") {
        return Err(BifrostError::Configuration(format!(
            "provider name '{name}' must not end with '_models'"
        )));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.contains('\0') {
        return Err(invalid(format!("{field} must not contain null bytes")));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(invalid(format!(
            "{field} exceeds maximum length of {max_len} characters (got {len})"
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> BifrostError {
    BifrostError::Validation(message.into())
}
