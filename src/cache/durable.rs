//! Best-effort durable tier.
//!
//! [`DurableCache`] wraps an optional [`DurableStore`] and swallows every
//! failure: a probe error reads as a miss, an upload error reads as
//! "not persisted". Nothing in here can abort an avatar acquisition.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::providers::DurableStore;
use crate::providers::avatar::is_absolute_url;
use crate::telemetry;
use crate::types::CacheKey;

/// Durable cache tier in front of a CDN/object store.
#[derive(Clone, Default)]
pub struct DurableCache {
    store: Option<Arc<dyn DurableStore>>,
}

impl DurableCache {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A tier that never hits and never persists.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Probe for an already-persisted asset.
    ///
    /// Returns its URL on hit; `None` on miss, error, or when disabled.
    pub async fn check_existing(&self, key: &CacheKey) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.head(key).await {
            Ok(true) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "durable").increment(1);
                let url = store.asset_url(key);
                debug!(store = store.name(), %key, %url, "durable cache hit");
                Some(url)
            }
            Ok(false) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => "durable")
                    .increment(1);
                None
            }
            Err(e) => {
                metrics::counter!(telemetry::DURABLE_STORE_ERRORS_TOTAL, "operation" => "check")
                    .increment(1);
                warn!(store = store.name(), %key, error = %e, "durable cache probe failed, treating as miss");
                None
            }
        }
    }

    /// Persist the image at `source_url` under `key`.
    ///
    /// Returns the durable URL, or `None` if the store is disabled, failed,
    /// or answered with something unusable. Callers keep using `source_url`
    /// in that case.
    pub async fn store(&self, source_url: &str, key: &CacheKey) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.upload(source_url, key).await {
            Ok(Some(url)) if is_absolute_url(&url) => {
                debug!(store = store.name(), %key, %url, "stored avatar");
                Some(url)
            }
            Ok(other) => {
                warn!(store = store.name(), %key, returned = ?other, "durable store returned no usable URL");
                None
            }
            Err(e) => {
                metrics::counter!(telemetry::DURABLE_STORE_ERRORS_TOTAL, "operation" => "store")
                    .increment(1);
                warn!(store = store.name(), %key, error = %e, "durable store upload failed");
                None
            }
        }
    }
}
