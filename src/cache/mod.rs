//! Process-local development cache for provider results.
//!
//! Each provider owns one [`ProviderCache`]; the set is built once at start-up
//! as [`DevCaches`] and handed to the providers explicitly. Outside development
//! the caches are inert.

mod config;
pub(crate) mod lock;
mod store;

pub use config::DevCacheConfig;
pub use store::{CacheEntry, DevCaches, ProviderCache};
