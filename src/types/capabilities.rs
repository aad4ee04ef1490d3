//! Provider capability flags

use serde::{Deserialize, Serialize};

/// What a provider backend supports.
///
/// Only used to shape generated tool schemas and descriptions; dispatch
/// never branches on these flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Incremental token streaming.
    pub supports_streaming: bool,
    /// A separate system prompt is honoured.
    pub supports_system_prompt: bool,
    /// Image inputs.
    pub supports_images: bool,
    /// Tool/function calling.
    pub supports_function_calling: bool,
}

impl Capabilities {
    /// Every capability enabled.
    pub fn full() -> Self {
        Self {
            supports_streaming: true,
            supports_system_prompt: true,
            supports_images: true,
            supports_function_calling: true,
        }
    }

    /// Plain text in, plain text out.
    pub fn text_only() -> Self {
        Self::default()
    }

    /// Enable system prompt support.
    #[must_use]
    pub fn with_system_prompt(mut self) -> Self {
        self.supports_system_prompt = true;
        self
    }

    /// Enable streaming support.
    #[must_use]
    pub fn with_streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    /// Enable image input support.
    #[must_use]
    pub fn with_images(mut self) -> Self {
        self.supports_images = true;
        self
    }

    /// Human-readable feature list for tool descriptions, e.g.
    /// `"streaming, system prompts"`. Empty when nothing is supported.
    pub fn describe(&self) -> String {
        let mut features = Vec::new();
        if self.supports_streaming {
            features.push("streaming");
        }
        if self.supports_system_prompt {
            features.push("system prompts");
        }
        if self.supports_images {
            features.push("images");
        }
        if self.supports_function_calling {
            features.push("function calling");
        }
        features.join(", ")
    }
}
