//! Resolved avatar types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CacheKey;

/// Which tier produced an avatar URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarSource {
    /// Seeded into the volatile cache from an externally known URL.
    Cache,
    /// Found already persisted in the durable store.
    Durable,
    /// Freshly generated by the image provider.
    Provider,
    /// Derived locally without any external call.
    Placeholder,
}

impl AvatarSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarSource::Cache => "cache",
            AvatarSource::Durable => "durable",
            AvatarSource::Provider => "provider",
            AvatarSource::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for AvatarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved portrait, as stored in the volatile cache.
///
/// Records are never mutated; a fresher resolution (e.g. a manual
/// regenerate) replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRecord {
    pub key: CacheKey,
    pub url: String,
    pub source: AvatarSource,
}

impl AvatarRecord {
    pub fn new(key: CacheKey, url: impl Into<String>, source: AvatarSource) -> Self {
        Self {
            key,
            url: url.into(),
            source,
        }
    }
}

/// What callers of [`AvatarService::acquire`](crate::AvatarService::acquire) get back.
///
/// `url` is always a non-empty absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub url: String,
    pub source: AvatarSource,
}

impl From<AvatarRecord> for Avatar {
    fn from(record: AvatarRecord) -> Self {
        Self {
            url: record.url,
            source: record.source,
        }
    }
}
