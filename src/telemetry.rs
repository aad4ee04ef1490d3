//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "ollama", "openai")
//! - `operation`: "invoke" or "list_models"
//! - `status`: "ok" or "error"
//! - `direction`: "prompt" or "completion"

/// Total tool calls dispatched to a provider.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "bifrost_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "bifrost_retries_total";

/// Total tokens reported by providers.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "bifrost_tokens_total";

/// History entries kept in memory but not persisted.
pub const HISTORY_WRITE_FAILURES_TOTAL: &str = "bifrost_history_write_failures_total";
