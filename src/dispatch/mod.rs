//! Tool-name routing and call dispatch.

mod dispatcher;
mod route;

pub use dispatcher::{DEFAULT_MAX_RESPONSE_LENGTH, Dispatcher};
pub use route::ToolRoute;
