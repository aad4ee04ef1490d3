//! Tool name ⇄ (provider, action) mapping.
//!
//! The wire names are fixed: `use_<provider>` invokes a model and
//! `list_<provider>_models` lists models. [`ToolRoute::parse`] is the only
//! place those names are taken apart and [`ToolRoute::tool_name`] the only
//! place they are built.

use std::fmt;

use crate::{BifrostError, Result};

const INVOKE_PREFIX: &str = "use_";
const LIST_PREFIX: &str = "list_";
const LIST_SUFFIX: &str = "_models";

/// A parsed tool name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolRoute {
    /// `use_<provider>`
    Invoke(String),
    /// `list_<provider>_models`
    ListModels(String),
}

impl ToolRoute {
    /// Parse a tool name. Anything but the two known shapes with a
    /// non-empty provider segment is [`BifrostError::UnknownTool`].
    pub fn parse(tool_name: &str) -> Result<Self> {
        if let Some(provider) = tool_name.strip_prefix(INVOKE_PREFIX) {
            if !provider.is_empty() {
                return Ok(Self::Invoke(provider.to_string()));
            }
        } else if let Some(provider) = tool_name
            .strip_prefix(LIST_PREFIX)
            .and_then(|rest| rest.strip_suffix(LIST_SUFFIX))
        {
            if !provider.is_empty() {
                return Ok(Self::ListModels(provider.to_string()));
            }
        }
        Err(BifrostError::UnknownTool(tool_name.to_string()))
    }

    /// Target provider name.
    pub fn provider(&self) -> &str {
        match self {
            Self::Invoke(p) | Self::ListModels(p) => p,
        }
    }

    /// Wire-level tool name.
    pub fn tool_name(&self) -> String {
        match self {
            Self::Invoke(p) => format!("{INVOKE_PREFIX}{p}"),
            Self::ListModels(p) => format!("{LIST_PREFIX}{p}{LIST_SUFFIX}"),
        }
    }
}

impl fmt::Display for ToolRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tool_name())
    }
}
