//! The avatar orchestrator.
//!
//! [`AvatarService::acquire`] walks a fixed sequence of tiers and always
//! comes back with a URL:
//!
//! ```text
//! CheckVolatile ─hit─────────────────────────────────────────────▶ Done
//!      │miss
//! CheckDurable ──hit──▶ (write volatile) ────────────────────────▶ Done(durable)
//!      │miss/error
//! CheckProviderGate ──auth disabled / no provider──▶ Placeholder
//!      │(wait out backoff)
//! CallProvider ──ok──▶ (store durable, write volatile) ──────────▶ Done(provider)
//!      │auth / rate-limited / generic
//! Placeholder ──▶ (write volatile, persist opportunistically) ───▶ Done(placeholder)
//! ```
//!
//! Every external failure becomes a transition; nothing is returned as an
//! error. Concurrent misses on the same key share one resolution, and that
//! resolution runs on its own task so a caller that goes away does not
//! cancel it.

mod builder;

pub use builder::AvatarServiceBuilder;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::cache::{DurableCache, VolatileCache};
use crate::config::{Config, Secrets};
use crate::error::FailureKind;
use crate::placeholder::PlaceholderGenerator;
use crate::providers::avatar::is_absolute_url;
use crate::providers::{AvatarProvider, RateLimitState, RateLimiter};
use crate::telemetry;
use crate::types::{Avatar, AvatarRecord, AvatarSource, CacheKey, Subject};

/// Resolution steps after the volatile cache has missed.
#[derive(Debug)]
enum Step {
    CheckDurable,
    CheckProviderGate,
    CallProvider,
    Placeholder,
    Done(AvatarRecord),
}

/// Process-wide avatar acquisition service.
///
/// Cheap to clone; clones share caches and rate-limit state. Construct one
/// per process with [`AvatarService::builder()`] and hand it to whatever
/// needs avatars.
#[derive(Clone)]
pub struct AvatarService {
    inner: Arc<Inner>,
}

struct Inner {
    volatile: VolatileCache,
    durable: DurableCache,
    limiter: RateLimiter,
    provider: Option<AvatarProvider>,
    placeholder: PlaceholderGenerator,
    persist_placeholders: bool,
}

impl AvatarService {
    /// Create a new builder for configuring the service.
    pub fn builder() -> AvatarServiceBuilder {
        AvatarServiceBuilder::new()
    }

    /// Build a service from loaded configuration and secrets.
    ///
    /// See [`Config::build_service`].
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        config.build_service(secrets)
    }

    /// Get an avatar URL for a subject.
    ///
    /// Never fails and never returns an empty URL. Repeated calls for the
    /// same subject converge on the same cached record.
    #[instrument(skip(self, description))]
    pub async fn acquire(&self, name: &str, description: Option<&str>) -> Avatar {
        let subject = Subject::new(name, description);
        let key = CacheKey::for_subject(&subject);

        if let Some(record) = self.inner.volatile.get(&key).await {
            debug!(%key, source = %record.source, "volatile cache hit");
            return finish(record);
        }

        let resolution = Arc::clone(&self.inner).resolve_owned(key.clone(), subject.clone());
        match self.inner.volatile.get_or_resolve(key.clone(), resolution).await {
            Some((record, started)) => {
                if !started {
                    debug!(%key, "joined in-flight resolution");
                }
                finish(record)
            }
            None => finish(self.inner.placeholder_record(&key, &subject)),
        }
    }

    /// Force a fresh portrait from the provider, replacing any cached one.
    ///
    /// Skips both cache tiers on the way in and overwrites both on success.
    /// If the provider is unavailable or fails, the currently cached record
    /// is kept; with nothing cached, a placeholder is returned.
    #[instrument(skip(self, description))]
    pub async fn regenerate(&self, name: &str, description: Option<&str>) -> Avatar {
        let subject = Subject::new(name, description);
        let key = CacheKey::for_subject(&subject);
        let inner = &self.inner;

        let fresh = if inner.pass_gate().await {
            inner.call_provider(&key, &subject).await
        } else {
            None
        };

        let record = match fresh {
            Some(record) => {
                inner.volatile.set(record.clone()).await;
                record
            }
            None => match inner.volatile.get(&key).await {
                Some(existing) => {
                    info!(%key, "regeneration failed, keeping cached avatar");
                    existing
                }
                None => {
                    let record = inner.placeholder_record(&key, &subject);
                    inner.volatile.set(record.clone()).await;
                    record
                }
            },
        };
        finish(record)
    }

    /// Seed the volatile cache with a URL obtained elsewhere.
    ///
    /// Used when the caller already holds an authoritative URL for a subject
    /// (e.g. a persisted character image). Returns false, and caches
    /// nothing, if `url` is not an absolute http(s) URL.
    pub async fn remember(&self, name: &str, description: Option<&str>, url: &str) -> bool {
        if !is_absolute_url(url) {
            return false;
        }
        let key = CacheKey::new(name, description);
        self.inner
            .volatile
            .set(AvatarRecord::new(key, url.trim(), AvatarSource::Cache))
            .await;
        true
    }

    /// The cached record for a subject, without resolving anything.
    pub async fn cached(&self, name: &str, description: Option<&str>) -> Option<AvatarRecord> {
        self.inner.volatile.get(&CacheKey::new(name, description)).await
    }

    /// The placeholder URL a subject with this name would get.
    pub fn placeholder_url(&self, name: &str) -> String {
        self.inner.placeholder.generate(name.trim())
    }

    /// Whether `url` is one of this service's placeholder images.
    pub fn is_placeholder_url(&self, url: &str) -> bool {
        self.inner.placeholder.is_placeholder(url)
    }

    /// Clear the sticky provider authentication failure.
    pub fn reset_provider_auth_status(&self) {
        info!("provider authentication status reset");
        self.inner.limiter.reset_auth();
    }

    /// Clear backoff counters.
    pub fn reset_rate_limit_state(&self) {
        debug!("rate limit state reset");
        self.inner.limiter.reset();
    }

    /// Current rate-limit state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        self.inner.limiter.state()
    }

    /// Whether an image provider is configured at all.
    pub fn has_provider(&self) -> bool {
        self.inner.provider.is_some()
    }
}

fn finish(record: AvatarRecord) -> Avatar {
    metrics::counter!(telemetry::ACQUISITIONS_TOTAL, "source" => record.source.as_str())
        .increment(1);
    Avatar::from(record)
}

impl Inner {
    /// [`Inner::resolve`] as a `'static` future the volatile cache can run on its own task.
    async fn resolve_owned(self: Arc<Self>, key: CacheKey, subject: Subject) -> AvatarRecord {
        self.resolve(&key, &subject).await
    }

    /// Everything after a volatile miss.
    async fn resolve(&self, key: &CacheKey, subject: &Subject) -> AvatarRecord {
        let mut step = Step::CheckDurable;
        loop {
            step = match step {
                Step::CheckDurable => match self.durable.check_existing(key).await {
                    Some(url) => Step::Done(AvatarRecord::new(key.clone(), url, AvatarSource::Durable)),
                    None => Step::CheckProviderGate,
                },
                Step::CheckProviderGate => {
                    if self.pass_gate().await {
                        Step::CallProvider
                    } else {
                        Step::Placeholder
                    }
                }
                Step::CallProvider => match self.call_provider(key, subject).await {
                    Some(record) => Step::Done(record),
                    None => Step::Placeholder,
                },
                Step::Placeholder => Step::Done(self.placeholder_record(key, subject)),
                Step::Done(record) => return record,
            };
        }
    }

    /// Decide whether the provider may be called now, waiting out backoff if so.
    async fn pass_gate(&self) -> bool {
        if self.provider.is_none() {
            return false;
        }
        if !self.limiter.is_provider_usable() {
            debug!("provider disabled after authentication failure");
            return false;
        }

        let wait = self.limiter.reserve_slot();
        if !wait.is_zero() {
            metrics::histogram!(telemetry::BACKOFF_WAIT_SECONDS).record(wait.as_secs_f64());
            debug!(?wait, "waiting out provider backoff");
            tokio::time::sleep(wait).await;
        }

        // Another caller may have hit an auth failure while we slept.
        self.limiter.is_provider_usable()
    }

    /// One provider attempt. `None` means fall through to the placeholder.
    async fn call_provider(&self, key: &CacheKey, subject: &Subject) -> Option<AvatarRecord> {
        let provider = self.provider.as_ref()?;
        match provider.generate(subject).await {
            Ok(url) => {
                self.limiter.record_success();
                let url = match self.durable.store(&url, key).await {
                    Some(durable_url) => durable_url,
                    None => url,
                };
                info!(%key, %url, "avatar generated");
                Some(AvatarRecord::new(key.clone(), url, AvatarSource::Provider))
            }
            Err(FailureKind::Auth) => {
                self.limiter.record_failure(true);
                warn!(
                    provider = provider.name(),
                    "provider rejected credentials, disabling until reset"
                );
                None
            }
            Err(kind) => {
                self.limiter.record_failure(false);
                let failures = self.limiter.state().consecutive_failures;
                debug!(kind = kind.as_str(), failures, "provider attempt failed, using placeholder");
                None
            }
        }
    }

    /// Build a placeholder record and, if enabled, persist it in the background.
    ///
    /// The image is stored under the placeholder's own key, never the
    /// subject's, so a later durable probe for the subject still misses.
    fn placeholder_record(&self, key: &CacheKey, subject: &Subject) -> AvatarRecord {
        let url = self.placeholder.generate(&subject.name);
        info!(%key, %url, "using placeholder avatar");

        if self.persist_placeholders && self.durable.is_enabled() {
            let durable = self.durable.clone();
            let source = url.clone();
            let asset_key = self.placeholder.asset_key(&subject.name);
            tokio::spawn(async move {
                durable.store(&source, &asset_key).await;
            });
        }

        AvatarRecord::new(key.clone(), url, AvatarSource::Placeholder)
    }
}
