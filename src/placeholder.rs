//! Provider-free fallback portraits.
//!
//! [`PlaceholderGenerator`] derives a stable URL from a name alone. The
//! preferred style is an initial-letter badge whose background colour is
//! picked by hashing the name into a small palette. When no badge service
//! is configured (or the URL cannot be built) it falls back to an
//! initial-letter avatar service keyed only by the first character, and
//! past that to a fixed URL. Generation is synchronous and cannot fail.

use sha2::{Digest, Sha256};
use tracing::warn;
use url::Url;

use crate::providers::AVATAR_SIZE;
use crate::telemetry;
use crate::types::CacheKey;

/// Default badge renderer (initial + background colour).
pub const DEFAULT_BADGE_BASE: &str = "https://ui-avatars.com/api/";

/// Default initial-letter avatar service.
pub const DEFAULT_INITIAL_BASE: &str = "https://robohash.org/";

/// Last-resort URL when neither service URL can be built.
pub const FALLBACK_URL: &str = "https://robohash.org/avatar?size=256x256&set=set4";

/// Badge background colours, indexed by name hash.
pub const PALETTE: [&str; 8] = [
    "4f46e5", "0891b2", "059669", "ca8a04", "dc2626", "db2777", "7c3aed", "475569",
];

/// Deterministic placeholder URL builder.
#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    badge_base: Option<Url>,
    initial_base: Option<Url>,
}

impl Default for PlaceholderGenerator {
    fn default() -> Self {
        Self {
            badge_base: Url::parse(DEFAULT_BADGE_BASE).ok(),
            initial_base: Url::parse(DEFAULT_INITIAL_BASE).ok(),
        }
    }
}

impl PlaceholderGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different badge service, or `None` to skip badges entirely.
    pub fn badge_base(mut self, base: Option<Url>) -> Self {
        self.badge_base = base;
        self
    }

    /// Use a different initial-letter service, or `None` to go straight to [`FALLBACK_URL`].
    pub fn initial_base(mut self, base: Option<Url>) -> Self {
        self.initial_base = base;
        self
    }

    /// Placeholder URL for `name`. Same name, same URL, every time.
    pub fn generate(&self, name: &str) -> String {
        let initial = initial_for(name);

        if let Some(url) = self.badge_url(name, &initial) {
            metrics::counter!(telemetry::PLACEHOLDERS_TOTAL, "style" => "badge").increment(1);
            return url;
        }
        metrics::counter!(telemetry::PLACEHOLDERS_TOTAL, "style" => "initial").increment(1);
        self.initial_url(&initial).unwrap_or_else(|| {
            warn!(base = ?self.initial_base, "initial avatar URL could not be built");
            FALLBACK_URL.to_string()
        })
    }

    /// Durable-store key for the image [`generate`](Self::generate) returns for `name`.
    pub fn asset_key(&self, name: &str) -> CacheKey {
        let colour = self
            .badge_base
            .as_ref()
            .filter(|base| !base.cannot_be_a_base())
            .map(|_| color_for(name));
        CacheKey::placeholder(&initial_for(name), colour)
    }

    /// Whether `url` could have come from this generator.
    pub fn is_placeholder(&self, url: &str) -> bool {
        let matches_base = |base: &Url| url.starts_with(base.as_str().trim_end_matches('/'));
        url == FALLBACK_URL
            || self.badge_base.as_ref().is_some_and(matches_base)
            || self.initial_base.as_ref().is_some_and(matches_base)
    }

    fn badge_url(&self, name: &str, initial: &str) -> Option<String> {
        let mut url = self.badge_base.clone()?;
        if url.cannot_be_a_base() {
            return None;
        }
        let size = AVATAR_SIZE.to_string();
        url.query_pairs_mut()
            .clear()
            .append_pair("name", initial)
            .append_pair("background", color_for(name))
            .append_pair("color", "ffffff")
            .append_pair("size", &size)
            .append_pair("bold", "true");
        Some(url.into())
    }

    fn initial_url(&self, initial: &str) -> Option<String> {
        let mut url = self.initial_base.clone()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(initial);
        url.query_pairs_mut()
            .clear()
            .append_pair("size", &format!("{AVATAR_SIZE}x{AVATAR_SIZE}"))
            .append_pair("set", "set4");
        Some(url.into())
    }
}

/// Uppercased first alphanumeric character of `name`, or `?`.
pub fn initial_for(name: &str) -> String {
    name.chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

/// Palette colour for `name`, stable across processes and releases.
pub fn color_for(name: &str) -> &'static str {
    let digest = Sha256::digest(name.trim().to_lowercase().as_bytes());
    PALETTE[usize::from(digest[0]) % PALETTE.len()]
}
