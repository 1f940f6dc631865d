//! Builder for configuring avatar service instances

use std::sync::Arc;

use super::{AvatarService, Inner};
use crate::cache::{DEFAULT_VOLATILE_CACHE_MAX, DurableCache, VolatileCache};
use crate::placeholder::PlaceholderGenerator;
use crate::providers::{
    AvatarProvider, CdnStore, DurableStore, ImageProvider, RateLimitConfig, RateLimiter,
    TogetherClient,
};
use crate::{Result, VisageError};

/// Builder for configuring avatar service instances.
///
/// ```rust,no_run
/// # use visage::{AvatarService, RateLimitConfig};
/// # use std::time::Duration;
/// # fn main() -> visage::Result<()> {
/// let service = AvatarService::builder()
///     .together("together-api-key")
///     .cdn("https://cdn.example/avatars", "https://cdn.example/upload")
///     .rate_limit(RateLimitConfig::new().min_delay(Duration::from_secs(2)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct AvatarServiceBuilder {
    provider: Option<Arc<dyn ImageProvider>>,
    together_key: Option<String>,
    durable: Option<Arc<dyn DurableStore>>,
    cdn: Option<(String, String)>,
    cdn_key: Option<String>,
    rate_limit: RateLimitConfig,
    placeholder: PlaceholderGenerator,
    cache_max_entries: u64,
    persist_placeholders: bool,
}

impl AvatarServiceBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            together_key: None,
            durable: None,
            cdn: None,
            cdn_key: None,
            rate_limit: RateLimitConfig::default(),
            placeholder: PlaceholderGenerator::default(),
            cache_max_entries: DEFAULT_VOLATILE_CACHE_MAX,
            persist_placeholders: true,
        }
    }

    /// Use a custom image provider. Takes precedence over [`together()`](Self::together).
    pub fn provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Configure the Together AI provider.
    pub fn together(mut self, api_key: impl Into<String>) -> Self {
        self.together_key = Some(api_key.into());
        self
    }

    /// Use a custom durable store. Takes precedence over [`cdn()`](Self::cdn).
    pub fn durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Configure the CDN durable store.
    pub fn cdn(mut self, delivery_base: impl Into<String>, upload_url: impl Into<String>) -> Self {
        self.cdn = Some((delivery_base.into(), upload_url.into()));
        self
    }

    /// Bearer token for CDN uploads.
    pub fn cdn_key(mut self, api_key: impl Into<String>) -> Self {
        self.cdn_key = Some(api_key.into());
        self
    }

    /// Backoff bounds for provider calls.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Placeholder URL derivation.
    pub fn placeholder(mut self, generator: PlaceholderGenerator) -> Self {
        self.placeholder = generator;
        self
    }

    /// Upper bound on volatile cache entries (default: 10,000).
    pub fn cache_max_entries(mut self, max: u64) -> Self {
        self.cache_max_entries = max;
        self
    }

    /// Whether placeholders are uploaded to the durable store in the background (default: true).
    pub fn persist_placeholders(mut self, enabled: bool) -> Self {
        self.persist_placeholders = enabled;
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<AvatarService> {
        if self.rate_limit.min_delay > self.rate_limit.max_delay {
            return Err(VisageError::Configuration(format!(
                "rate limit min_delay ({:?}) exceeds max_delay ({:?})",
                self.rate_limit.min_delay, self.rate_limit.max_delay
            )));
        }
        if self.cache_max_entries == 0 {
            return Err(VisageError::Configuration(
                "cache_max_entries must be greater than zero".to_string(),
            ));
        }

        let provider = match (self.provider, self.together_key) {
            (Some(provider), _) => Some(provider),
            (None, Some(key)) => Some(Arc::new(TogetherClient::new(key)?) as Arc<dyn ImageProvider>),
            (None, None) => None,
        };

        let durable = match (self.durable, self.cdn) {
            (Some(store), _) => DurableCache::new(store),
            (None, Some((delivery_base, upload_url))) => {
                let mut store = CdnStore::new(delivery_base, upload_url)?;
                if let Some(key) = self.cdn_key {
                    store = store.api_key(key);
                }
                DurableCache::new(Arc::new(store))
            }
            (None, None) => DurableCache::disabled(),
        };

        Ok(AvatarService {
            inner: Arc::new(Inner {
                volatile: VolatileCache::with_max_entries(self.cache_max_entries),
                durable,
                limiter: RateLimiter::new(self.rate_limit),
                provider: provider.map(AvatarProvider::new),
                placeholder: self.placeholder,
                persist_placeholders: self.persist_placeholders,
            }),
        })
    }
}

impl Default for AvatarServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
