//! The `(name, description)` pair an avatar is requested for.

use serde::{Deserialize, Serialize};

/// Who (or what) a portrait is for.
///
/// A blank description is treated the same as no description, so
/// `Subject::new("Ada", Some("  "))` and `Subject::new("Ada", None)`
/// share a cache key and a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Subject {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned);
        Self {
            name: name.into().trim().to_owned(),
            description,
        }
    }

    /// Description, if one was given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
