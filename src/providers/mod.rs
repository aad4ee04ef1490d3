//! Provider contract, registry, and backend implementations.
//!
//! Backends are compiled in per cargo feature (`ollama`, `openai`,
//! `anthropic`, `gemini`; all on by default). [`factory::build_provider`]
//! reports a `Configuration` error for a backend whose feature is off.

pub mod factory;
#[cfg(any(feature = "ollama", feature = "openai", feature = "anthropic"))]
mod http;
pub mod registry;
pub mod retry;
pub mod traits;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use factory::{build_provider, registry_from_config};
pub use registry::{ProviderRegistry, descriptors_for};
pub use retry::RetryConfig;
pub use traits::{Provider, ProviderSettings};

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
#[cfg(feature = "gemini")]
pub use gemini::GeminiCliProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;
