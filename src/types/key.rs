//! Deterministic cache keys for avatar subjects.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Subject;

/// Prefix shared by every key. Keeps avatar assets grouped in the durable store.
pub const KEY_PREFIX: &str = "avatar";

/// Prefix for keys of stored placeholder images.
pub const PLACEHOLDER_KEY_PREFIX: &str = "placeholder";

/// Upper bound on key length, imposed by durable-store asset IDs.
pub const MAX_KEY_LEN: usize = 60;

/// Normalised storage key derived from a [`Subject`].
///
/// Built from `avatar-{name}[-{description}]`, lowercased, whitespace
/// collapsed to `_`, every character outside `[a-z0-9_-]` dropped, then
/// truncated to [`MAX_KEY_LEN`]. Identical subjects always produce identical
/// keys. Distinct subjects can collide (non-ASCII names, long descriptions
/// sharing a prefix); the later write wins in that case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a name and optional description.
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self::for_subject(&Subject::new(name, description))
    }

    /// Derive the key for an already-normalised subject.
    pub fn for_subject(subject: &Subject) -> Self {
        let mut raw = format!("{KEY_PREFIX}-{}", subject.name);
        if let Some(description) = subject.description() {
            raw.push('-');
            raw.push_str(description);
        }

        let mut key = String::with_capacity(MAX_KEY_LEN);
        let mut last_was_space = false;
        for c in raw.chars() {
            if key.len() >= MAX_KEY_LEN {
                break;
            }
            if c.is_whitespace() {
                if !last_was_space {
                    key.push('_');
                }
                last_was_space = true;
                continue;
            }
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                key.push(c);
                last_was_space = false;
            }
        }
        Self(key)
    }

    /// Key for a stored placeholder image, shared by every name that
    /// renders the same initial and colour.
    ///
    /// Non-ASCII initials are spelled as `u{hex}`. Never equal to a subject
    /// key.
    pub fn placeholder(initial: &str, colour: Option<&str>) -> Self {
        let mut key = format!("{PLACEHOLDER_KEY_PREFIX}-");
        for c in initial.chars() {
            if c.is_ascii_alphanumeric() {
                key.push(c.to_ascii_lowercase());
            } else {
                key.push_str(&format!("u{:x}", u32::from(c)));
            }
        }
        if let Some(colour) = colour {
            key.push('-');
            key.extend(colour.chars().filter(char::is_ascii_alphanumeric));
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
