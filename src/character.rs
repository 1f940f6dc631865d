//! Character portraits on top of [`AvatarService`].
//!
//! Characters carry a persisted image URL. A usable persisted URL is the
//! authority for that character; anything else (missing, relative, an
//! expiring pre-signed provider link) is treated as absent and replaced
//! through the service. Placeholders are never written back, and a
//! persisted placeholder URL counts as absent, so a later call or sweep
//! gets another chance at a real portrait.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::service::AvatarService;
use crate::types::{Avatar, AvatarSource};
use crate::Result;

/// Query parameter that marks a pre-signed, time-limited provider URL.
const EXPIRING_URL_PARAM: &str = "x-amz-expires";

/// A character whose portrait is managed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Persisted portrait URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Character {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            image_url: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Where character image URLs are persisted.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Current persisted image URL for a character.
    async fn get_image_url(&self, character_id: &str) -> Result<Option<String>>;

    /// Replace the persisted image URL for a character.
    async fn set_image_url(&self, character_id: &str, url: &str) -> Result<()>;
}

/// Counters from [`repair_character_images`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairStats {
    /// Characters examined.
    pub total: usize,
    /// Characters whose image URL was replaced.
    pub repaired: usize,
    /// Characters whose new URL could not be persisted.
    pub persist_failures: usize,
}

/// Whether a persisted URL can be served as-is.
///
/// Must be an absolute `http`/`https` URL and must not be a pre-signed
/// link that will stop working.
pub fn is_usable_image_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
        return false;
    }
    !parsed
        .query_pairs()
        .any(|(name, _)| name.eq_ignore_ascii_case(EXPIRING_URL_PARAM))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persisted {
    Unchanged,
    Written,
    Failed,
}

/// Portrait for a character, persisting a newly acquired one.
///
/// A usable persisted URL wins and is remembered by the service. Store
/// failures are logged; the returned avatar is still valid.
#[instrument(skip(service, store, character), fields(character = %character.id))]
pub async fn ensure_character_avatar(
    service: &AvatarService,
    store: &dyn CharacterStore,
    character: &Character,
) -> Avatar {
    ensure_inner(service, store, character).await.0
}

/// Force a fresh portrait for a character and persist it.
#[instrument(skip(service, store, character), fields(character = %character.id))]
pub async fn regenerate_character_avatar(
    service: &AvatarService,
    store: &dyn CharacterStore,
    character: &Character,
) -> Avatar {
    let avatar = service
        .regenerate(&character.name, character.description.as_deref())
        .await;
    persist(service, store, character, &avatar).await;
    avatar
}

/// Replace unusable image URLs across a set of characters.
///
/// At most `concurrency` characters are resolved at once (minimum 1).
pub async fn repair_character_images(
    service: &AvatarService,
    store: &dyn CharacterStore,
    characters: &[Character],
    concurrency: usize,
) -> RepairStats {
    let outcomes: Vec<Persisted> = stream::iter(characters)
        .map(|character| async move { ensure_inner(service, store, character).await.1 })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let stats = RepairStats {
        total: characters.len(),
        repaired: outcomes.iter().filter(|o| **o == Persisted::Written).count(),
        persist_failures: outcomes.iter().filter(|o| **o == Persisted::Failed).count(),
    };
    info!(
        total = stats.total,
        repaired = stats.repaired,
        persist_failures = stats.persist_failures,
        "character image repair finished"
    );
    stats
}

async fn ensure_inner(
    service: &AvatarService,
    store: &dyn CharacterStore,
    character: &Character,
) -> (Avatar, Persisted) {
    let description = character.description.as_deref();

    if let Some(url) = persisted_url(store, character).await
        && is_usable_image_url(&url)
        && !service.is_placeholder_url(&url)
    {
        service.remember(&character.name, description, &url).await;
        let avatar = Avatar {
            url: url.trim().to_string(),
            source: AvatarSource::Cache,
        };
        return (avatar, Persisted::Unchanged);
    }

    let avatar = service.acquire(&character.name, description).await;
    let outcome = persist(service, store, character, &avatar).await;
    (avatar, outcome)
}

/// The character's own URL, or the store's when the character carries none.
async fn persisted_url(store: &dyn CharacterStore, character: &Character) -> Option<String> {
    if let Some(url) = &character.image_url {
        return Some(url.clone());
    }
    match store.get_image_url(&character.id).await {
        Ok(url) => url,
        Err(e) => {
            warn!(character = %character.id, error = %e, "failed to read character image");
            None
        }
    }
}

async fn persist(
    service: &AvatarService,
    store: &dyn CharacterStore,
    character: &Character,
    avatar: &Avatar,
) -> Persisted {
    if avatar.source == AvatarSource::Placeholder || service.is_placeholder_url(&avatar.url) {
        debug!(character = %character.id, "not persisting placeholder");
        return Persisted::Unchanged;
    }
    if character.image_url.as_deref() == Some(avatar.url.as_str()) {
        return Persisted::Unchanged;
    }
    match store.set_image_url(&character.id, &avatar.url).await {
        Ok(()) => {
            debug!(character = %character.id, url = %avatar.url, "character image updated");
            Persisted::Written
        }
        Err(e) => {
            warn!(character = %character.id, error = %e, "failed to persist character image");
            Persisted::Failed
        }
    }
}
