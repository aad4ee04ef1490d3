//! Bifrost - interchangeable LLM backends as a uniform tool surface
//!
//! Every configured provider becomes two protocol tools, `use_<name>` and
//! `list_<name>_models`. A single dispatcher routes tool calls back to the
//! provider, validates input, enforces timeouts and retries, and records
//! every invoke outcome in an append-only history ledger.
//!
//! # Example
//!
//! ```rust,no_run
//! use bifrost::{Bifrost, Config};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let config = Config::from_toml(r#"
//!         [providers.ollama]
//!         baseUrl = "http://localhost:11434"
//!
//!         [providers.ollama.models]
//!         fast = "qwen2.5:7b"
//!     "#)?;
//!     let gateway = Bifrost::builder().config(config).build().await?;
//!
//!     let result = gateway
//!         .call_tool("use_ollama", &json!({"model": "fast", "prompt": "Hello!"}))
//!         .await?;
//!     println!("{}", result.text_content());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod history;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod validation;
pub mod version;

pub use config::{Config, ProviderConfig, SecurityConfig, ServerConfig};
pub use dispatch::{Dispatcher, ToolRoute};
pub use error::{BifrostError, Result};
pub use gateway::{Bifrost, BifrostBuilder, Gateway};
pub use history::{HistoryConfig, HistoryEntry, HistoryLedger};
pub use providers::{Provider, ProviderRegistry, ProviderSettings, RetryConfig};
pub use types::*;
pub use validation::Limits;
pub use version::{BuildInfo, PKG_VERSION, build_info, version_string};
