//! Public types for the Visage API.

mod avatar;
mod key;
mod subject;

pub use avatar::{Avatar, AvatarRecord, AvatarSource};
pub use key::{CacheKey, KEY_PREFIX, MAX_KEY_LEN, PLACEHOLDER_KEY_PREFIX};
pub use subject::Subject;
