//! Traits for the external services the avatar pipeline talks to.
//!
//! Both are narrow on purpose: the orchestrator only needs "make me an
//! image for this prompt" and "is this asset already stored / store it".
//! Test doubles implement these directly; production uses
//! [`TogetherClient`](super::TogetherClient) and [`CdnStore`](super::CdnStore).

use async_trait::async_trait;

use crate::Result;
use crate::types::CacheKey;

// ============================================================================
// Image Provider
// ============================================================================

/// Text-to-image generation API.
///
/// Errors should use the crate taxonomy so the orchestrator can tell
/// credentials problems (`AuthenticationFailed`) from pacing problems
/// (`RateLimited`) from everything else.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Generate one image and return its (possibly short-lived) URL.
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<String>;
}

// ============================================================================
// Durable Store
// ============================================================================

/// CDN-backed asset store addressed by [`CacheKey`].
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store name for logging/metrics.
    fn name(&self) -> &str;

    /// Public URL the asset for `key` is (or would be) served from.
    fn asset_url(&self, key: &CacheKey) -> String;

    /// Whether an asset exists for `key`. "Not found" is `Ok(false)`, not an error.
    async fn head(&self, key: &CacheKey) -> Result<bool>;

    /// Copy the image at `source_url` into the store under `key`.
    ///
    /// Returns the durable URL, or `None` if the store accepted the request
    /// but did not report where the asset lives.
    async fn upload(&self, source_url: &str, key: &CacheKey) -> Result<Option<String>>;
}
