use std::{
    collections::{BTreeMap, HashMap},
    sync::RwLock,
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::lock::{rw_read, rw_write};

use super::{KvError, KvStore, SetOptions};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expiry: Option<Expiry>,
}

#[derive(Debug, Clone, Copy)]
struct Expiry {
    at: Instant,
    wall_clock: OffsetDateTime,
}

/// Process-local store used in development and tests.
///
/// Expiry is checked lazily: reading an expired key removes it.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "infra::kv::memory", "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored value and its expiry, expired keys included.
    pub fn inspect(&self) -> MemoryKvView {
        let now = Instant::now();
        let entries = rw_read(&self.entries, "infra::kv::memory", "inspect");

        let mut data = BTreeMap::new();
        let mut expirations = BTreeMap::new();
        for (key, stored) in entries.iter() {
            data.insert(key.clone(), stored.value.clone());
            if let Some(expiry) = stored.expiry {
                let remaining = expiry.at.saturating_duration_since(now);
                expirations.insert(
                    key.clone(),
                    ExpirationView {
                        expires_at: expiry.wall_clock,
                        ttl_seconds: remaining.as_secs(),
                        expired: now >= expiry.at,
                    },
                );
            }
        }

        MemoryKvView {
            data,
            expirations,
            captured_at: OffsetDateTime::now_utc(),
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get_value(&self, key: &str) -> Result<Option<Value>, KvError> {
        let now = Instant::now();
        {
            let entries = rw_read(&self.entries, "infra::kv::memory", "get");
            match entries.get(key) {
                None => return Ok(None),
                Some(stored) if !is_expired(stored, now) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = rw_write(&self.entries, "infra::kv::memory", "evict");
        if entries.get(key).is_some_and(|stored| is_expired(stored, now)) {
            entries.remove(key);
            debug!(target = "folio::kv", key, "Evicted expired key");
        }
        Ok(None)
    }

    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<(), KvError> {
        let expiry = options.expire_after.map(|ttl| Expiry {
            at: Instant::now() + ttl,
            wall_clock: OffsetDateTime::now_utc() + ttl,
        });

        let mut entries = rw_write(&self.entries, "infra::kv::memory", "set");
        entries.insert(key.to_string(), StoredValue { value, expiry });
        debug!(
            target = "folio::kv",
            key,
            ttl_seconds = options.expire_after.map(|ttl| ttl.as_secs()),
            "Stored key"
        );
        Ok(())
    }
}

fn is_expired(stored: &StoredValue, now: Instant) -> bool {
    stored.expiry.is_some_and(|expiry| now >= expiry.at)
}

/// Debug view of the in-memory store.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryKvView {
    pub data: BTreeMap<String, Value>,
    pub expirations: BTreeMap<String, ExpirationView>,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpirationView {
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub ttl_seconds: u64,
    pub expired: bool,
}
