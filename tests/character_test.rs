//! Character helpers against an in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use visage::types::CacheKey;
use visage::{
    AvatarService, AvatarSource, Character, CharacterStore, DurableStore, ImageProvider,
    RateLimitConfig, RepairStats, Result, VisageError, ensure_character_avatar,
    regenerate_character_avatar, repair_character_images,
};

// ============================================================================
// Mocks
// ============================================================================

struct CountingProvider {
    fail: bool,
    calls: AtomicU32,
}

impl CountingProvider {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, prompt: &str, _width: u32, _height: u32) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(VisageError::Timeout);
        }
        assert!(prompt.starts_with("A portrait of"));
        Ok(format!("https://provider.example/{n}.png"))
    }
}

#[derive(Default)]
struct MemoryStore {
    urls: Mutex<HashMap<String, String>>,
    fail_reads: bool,
    fail_writes_for: Option<&'static str>,
}

impl MemoryStore {
    fn url(&self, id: &str) -> Option<String> {
        self.urls.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn get_image_url(&self, character_id: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(VisageError::Store("read failed".into()));
        }
        Ok(self.url(character_id))
    }

    async fn set_image_url(&self, character_id: &str, url: &str) -> Result<()> {
        if self.fail_writes_for == Some(character_id) {
            return Err(VisageError::Store("write failed".into()));
        }
        self.urls
            .lock()
            .unwrap()
            .insert(character_id.to_string(), url.to_string());
        Ok(())
    }
}

/// Durable store that keeps `key -> source URL` in memory.
#[derive(Default)]
struct MemoryAssets {
    assets: Mutex<HashMap<String, String>>,
}

impl MemoryAssets {
    fn keys(&self) -> Vec<String> {
        self.assets.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl DurableStore for MemoryAssets {
    fn name(&self) -> &str {
        "memory"
    }

    fn asset_url(&self, key: &CacheKey) -> String {
        format!("https://cdn.example/{key}.png")
    }

    async fn head(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.assets.lock().unwrap().contains_key(key.as_str()))
    }

    async fn upload(&self, source_url: &str, key: &CacheKey) -> Result<Option<String>> {
        self.assets
            .lock()
            .unwrap()
            .insert(key.to_string(), source_url.to_string());
        Ok(Some(self.asset_url(key)))
    }
}

fn fast_limits() -> RateLimitConfig {
    RateLimitConfig::new()
        .min_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
}

fn service(provider: Arc<CountingProvider>) -> AvatarService {
    AvatarService::builder()
        .provider(provider)
        .rate_limit(fast_limits())
        .build()
        .unwrap()
}

// ============================================================================
// ensure / regenerate
// ============================================================================

#[tokio::test]
async fn usable_persisted_url_is_authoritative() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore::default();
    let character = Character::new("c1", "Ada").with_image_url("https://cdn.example/ada.png");

    let avatar = ensure_character_avatar(&service, &store, &character).await;
    assert_eq!(avatar.url, "https://cdn.example/ada.png");
    assert_eq!(avatar.source, AvatarSource::Cache);
    assert_eq!(provider.call_count(), 0);
    assert!(store.url("c1").is_none(), "nothing to write back");

    // Remembered for plain acquisitions too.
    let again = service.acquire("Ada", None).await;
    assert_eq!(again.url, "https://cdn.example/ada.png");
}

#[tokio::test]
async fn missing_url_is_acquired_and_persisted() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore::default();
    let character = Character::new("c1", "Ada").with_description("poet of science");

    let avatar = ensure_character_avatar(&service, &store, &character).await;
    assert_eq!(avatar.source, AvatarSource::Provider);
    assert_eq!(store.url("c1").as_deref(), Some(avatar.url.as_str()));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn url_is_read_from_store_when_character_has_none() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore::default();
    store
        .set_image_url("c1", "https://cdn.example/stored.png")
        .await
        .unwrap();

    let avatar = ensure_character_avatar(&service, &store, &Character::new("c1", "Ada")).await;
    assert_eq!(avatar.url, "https://cdn.example/stored.png");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn unusable_urls_are_replaced() {
    for stale in [
        "/uploads/ada.png",
        "",
        "https://bucket.s3.amazonaws.com/ada.png?X-Amz-Expires=900",
    ] {
        let provider = CountingProvider::ok();
        let service = service(provider.clone());
        let store = MemoryStore::default();
        let character = Character::new("c1", "Ada").with_image_url(stale);

        let avatar = ensure_character_avatar(&service, &store, &character).await;
        assert_eq!(avatar.source, AvatarSource::Provider, "stale url {stale:?}");
        assert_eq!(store.url("c1").as_deref(), Some("https://provider.example/1.png"));
    }
}

#[tokio::test]
async fn placeholders_are_not_persisted() {
    let service = service(CountingProvider::failing());
    let store = MemoryStore::default();

    let avatar = ensure_character_avatar(&service, &store, &Character::new("c1", "Ada")).await;
    assert_eq!(avatar.source, AvatarSource::Placeholder);
    assert!(store.url("c1").is_none());
}

#[tokio::test]
async fn store_failures_are_swallowed() {
    let service = service(CountingProvider::ok());
    let store = MemoryStore {
        fail_reads: true,
        fail_writes_for: Some("c1"),
        ..Default::default()
    };

    let avatar = ensure_character_avatar(&service, &store, &Character::new("c1", "Ada")).await;
    assert_eq!(avatar.source, AvatarSource::Provider);
    assert!(!avatar.url.is_empty());
}

#[tokio::test]
async fn stored_placeholder_does_not_shadow_a_later_portrait() {
    let assets = Arc::new(MemoryAssets::default());
    let store = MemoryStore::default();
    let watson = Character::new("w", "Watson");

    let degraded = AvatarService::builder()
        .provider(CountingProvider::failing())
        .durable_store(assets.clone())
        .rate_limit(fast_limits())
        .build()
        .unwrap();
    let avatar = ensure_character_avatar(&degraded, &store, &watson).await;
    assert_eq!(avatar.source, AvatarSource::Placeholder);

    for _ in 0..50 {
        if !assets.keys().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let keys = assets.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("placeholder-"), "stored under {}", keys[0]);
    assert!(store.url("w").is_none());

    // Fresh process, healthy provider, same durable store.
    let provider = CountingProvider::ok();
    let healthy = AvatarService::builder()
        .provider(provider.clone())
        .durable_store(assets.clone())
        .rate_limit(fast_limits())
        .build()
        .unwrap();
    let avatar = ensure_character_avatar(&healthy, &store, &watson).await;
    assert_eq!(avatar.source, AvatarSource::Provider);
    assert_eq!(avatar.url, "https://cdn.example/avatar-watson.png");
    assert_eq!(provider.call_count(), 1);
    assert_eq!(store.url("w").as_deref(), Some("https://cdn.example/avatar-watson.png"));
}

#[tokio::test]
async fn persisted_placeholder_url_is_replaced() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore::default();
    let stale = service.placeholder_url("Ada");
    let character = Character::new("c1", "Ada").with_image_url(stale);

    let avatar = ensure_character_avatar(&service, &store, &character).await;
    assert_eq!(avatar.source, AvatarSource::Provider);
    assert_eq!(store.url("c1").as_deref(), Some("https://provider.example/1.png"));
}

#[tokio::test]
async fn regenerate_overwrites_persisted_url() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore::default();
    let character = Character::new("c1", "Ada").with_image_url("https://cdn.example/old.png");

    let avatar = regenerate_character_avatar(&service, &store, &character).await;
    assert_eq!(avatar.url, "https://provider.example/1.png");
    assert_eq!(store.url("c1").as_deref(), Some("https://provider.example/1.png"));
}

// ============================================================================
// repair sweep
// ============================================================================

#[tokio::test]
async fn repair_fixes_only_unusable_entries() {
    let provider = CountingProvider::ok();
    let service = service(provider.clone());
    let store = MemoryStore {
        fail_writes_for: Some("c4"),
        ..Default::default()
    };

    let characters = vec![
        Character::new("c1", "Ada").with_image_url("https://cdn.example/ada.png"),
        Character::new("c2", "Babbage").with_image_url("/img/babbage.png"),
        Character::new("c3", "Turing"),
        Character::new("c4", "Hopper").with_image_url("relative.png"),
    ];

    let stats = repair_character_images(&service, &store, &characters, 2).await;
    assert_eq!(
        stats,
        RepairStats {
            total: 4,
            repaired: 2,
            persist_failures: 1,
        }
    );
    assert_eq!(provider.call_count(), 3);
    assert!(store.url("c1").is_none());
    assert!(store.url("c2").is_some());
    assert!(store.url("c3").is_some());
    assert!(store.url("c4").is_none());
}

#[tokio::test]
async fn repair_with_zero_concurrency_still_runs() {
    let service = service(CountingProvider::ok());
    let store = MemoryStore::default();
    let characters = vec![Character::new("c1", "Ada")];

    let stats = repair_character_images(&service, &store, &characters, 0).await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.repaired, 1);
}

#[tokio::test]
async fn repair_of_nothing() {
    let service = service(CountingProvider::ok());
    let stats = repair_character_images(&service, &MemoryStore::default(), &[], 4).await;
    assert_eq!(stats, RepairStats::default());
}
