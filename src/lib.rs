//! Visage - avatar acquisition for named characters
//!
//! Given a character's name and optional description, [`AvatarService`]
//! returns a portrait URL. It checks an in-process cache, then a durable
//! asset store, then an image generation provider (paced by a global
//! backoff gate), and falls back to a deterministic placeholder. The
//! result is always a usable URL; failures only change which tier answers.
//!
//! # Example
//!
//! ```rust,no_run
//! use visage::AvatarService;
//!
//! #[tokio::main]
//! async fn main() -> visage::Result<()> {
//!     let service = AvatarService::builder()
//!         .together("together-api-key")
//!         .cdn("https://cdn.example/avatars", "https://cdn.example/upload")
//!         .build()?;
//!
//!     let avatar = service
//!         .acquire("Sherlock Holmes", Some("a consulting detective"))
//!         .await;
//!
//!     println!("{} ({})", avatar.url, avatar.source);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```rust,no_run
//! use visage::{Config, Secrets};
//!
//! # fn main() -> visage::Result<()> {
//! let config = Config::load(None)?;
//! let service = config.build_service(&Secrets::load()?)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod character;
pub mod config;
pub mod error;
pub mod placeholder;
pub mod providers;
pub mod service;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use config::{Config, Secrets};
pub use error::{FailureKind, Result, VisageError};
pub use placeholder::PlaceholderGenerator;
pub use providers::{
    CdnStore, DurableStore, ImageProvider, RateLimitConfig, RateLimitState, RateLimiter,
    TogetherClient,
};
pub use service::{AvatarService, AvatarServiceBuilder};

pub use character::{
    Character, CharacterStore, RepairStats, ensure_character_avatar, is_usable_image_url,
    regenerate_character_avatar, repair_character_images,
};

// Re-export all types
pub use types::{Avatar, AvatarRecord, AvatarSource, CacheKey, Subject};
