//! External service clients and the provider-side pacing gate.
//!
//! - [`traits`]: `ImageProvider` and `DurableStore` seams
//! - [`together`]: Together AI image generation client
//! - [`cdn`]: CDN-backed durable asset store client
//! - [`avatar`]: prompt construction and failure classification
//! - [`rate_limit`]: global backoff and sticky auth gate

pub mod avatar;
pub mod cdn;
pub mod rate_limit;
pub mod together;
pub mod traits;

pub use avatar::{AVATAR_SIZE, AvatarProvider, prompt_for};
pub use cdn::CdnStore;
pub use rate_limit::{RateLimitConfig, RateLimitState, RateLimiter};
pub use together::TogetherClient;
pub use traits::{DurableStore, ImageProvider};
