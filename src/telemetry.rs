//! Telemetry metric name constants.
//!
//! Centralised metric names for visage operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `visage_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source`: avatar origin, one of "cache", "durable", "provider", "placeholder"
//! - `tier`: "volatile" or "durable"
//! - `provider`: image provider name (e.g. "together")
//! - `status`: "ok", "auth", "rate_limited", "generic"

/// Total avatars handed back to callers.
///
/// Labels: `source`.
pub const ACQUISITIONS_TOTAL: &str = "visage_acquisitions_total";

/// Total cache hits.
///
/// Labels: `tier` ("volatile" | "durable").
pub const CACHE_HITS_TOTAL: &str = "visage_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier` ("volatile" | "durable").
pub const CACHE_MISSES_TOTAL: &str = "visage_cache_misses_total";

/// Total image generation requests sent to the provider.
///
/// Labels: `provider`, `status`.
pub const PROVIDER_REQUESTS_TOTAL: &str = "visage_provider_requests_total";

/// Provider request duration in seconds.
///
/// Labels: `provider`.
pub const PROVIDER_REQUEST_DURATION_SECONDS: &str = "visage_provider_request_duration_seconds";

/// Time spent waiting out provider backoff before a call, in seconds.
pub const BACKOFF_WAIT_SECONDS: &str = "visage_backoff_wait_seconds";

/// Durable store failures that were swallowed.
///
/// Labels: `operation` ("check" | "store").
pub const DURABLE_STORE_ERRORS_TOTAL: &str = "visage_durable_store_errors_total";

/// Placeholders produced.
///
/// Labels: `style` ("badge" | "initial").
pub const PLACEHOLDERS_TOTAL: &str = "visage_placeholders_total";
