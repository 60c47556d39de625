use std::{collections::HashMap, sync::RwLock, time::Duration};

use folio_api_types::{ArticleFeed, MusicActivity, Weather};
use tokio::time::Instant;
use tracing::debug;

use super::{
    DevCacheConfig,
    lock::{rw_read, rw_write},
};

/// A cached value and the moment it was captured.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub captured_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now < self.captured_at + ttl
    }
}

/// Keyed cache of one provider's last good results.
///
/// Fresh entries short-circuit the upstream call; stale entries are kept as
/// the last resort before a literal default.
#[derive(Debug)]
pub struct ProviderCache<T> {
    name: &'static str,
    config: DevCacheConfig,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> ProviderCache<T> {
    pub fn new(name: &'static str, config: DevCacheConfig) -> Self {
        Self {
            name,
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached value for `key` if it is still within its TTL.
    pub fn fresh(&self, key: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let entries = rw_read(&self.entries, "cache::store", "fresh");
        let entry = entries.get(key)?;
        if entry.is_fresh(self.config.ttl(), Instant::now()) {
            debug!(cache = self.name, key, outcome = "hit", "serving cached provider result");
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// The cached value for `key` regardless of age.
    pub fn stale(&self, key: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let entries = rw_read(&self.entries, "cache::store", "stale");
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn store(&self, key: &str, value: T) {
        if !self.config.enabled {
            return;
        }
        let mut entries = rw_write(&self.entries, "cache::store", "store");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                captured_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "cache::store", "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The development caches of the three data providers.
#[derive(Debug)]
pub struct DevCaches {
    pub weather: ProviderCache<Weather>,
    pub articles: ProviderCache<ArticleFeed>,
    pub music: ProviderCache<MusicActivity>,
}

impl DevCaches {
    pub fn new(config: &DevCacheConfig) -> Self {
        Self {
            weather: ProviderCache::new("weather", config.clone()),
            articles: ProviderCache::new("articles", config.clone()),
            music: ProviderCache::new("music", config.clone()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(&DevCacheConfig::default())
    }
}
