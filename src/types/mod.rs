//! Public types for the Bifrost API.

mod capabilities;
mod request;
mod response;
mod tool;

pub use capabilities::Capabilities;
pub use request::InferenceRequest;
pub use response::{DURATION_MS, InferenceResponse, TRUNCATED, Usage};
pub use tool::{ToolCallResult, ToolContent, ToolDescriptor};
