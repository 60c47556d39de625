//! Key-value store adapter with per-key expiry.
//!
//! Two backends share the [`KvStore`] contract: a process-local
//! [`MemoryKv`] for development and tests, and [`RestKv`] for a
//! Redis-compatible REST endpoint. The backend is chosen once from
//! configuration through [`KvBackend`].

mod memory;
mod rest;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{config::KvSettings, domain::fallback};

pub use memory::{ExpirationView, MemoryKv, MemoryKvView};
pub use rest::RestKv;

/// Key under which the aggregated profile is stored.
pub const PROFILE_KEY: &str = "profile";
/// Key under which the synthesized blurb is stored.
pub const BLURB_KEY: &str = "blurb";

#[derive(Debug, Error)]
pub enum KvError {
    #[error("kv transport error: {0}")]
    Transport(String),
    #[error("kv backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("kv backend error: {0}")]
    Backend(String),
    #[error("failed to decode value for `{key}`: {message}")]
    Decode { key: String, message: String },
    #[error("failed to encode value for `{key}`: {message}")]
    Encode { key: String, message: String },
}

impl KvError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    fn encode(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Encode {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Time after which the key is forgotten. `None` keeps it until overwritten.
    pub expire_after: Option<Duration>,
}

impl SetOptions {
    pub fn expire_after(ttl: Duration) -> Self {
        Self {
            expire_after: Some(ttl),
        }
    }
}

/// Storage contract shared by every backend. Values travel as JSON.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<Value>, KvError>;

    /// Overwrite `key` with `value`. Last write wins.
    async fn set_value(&self, key: &str, value: Value, options: SetOptions)
    -> Result<(), KvError>;
}

impl<'a> dyn KvStore + 'a {
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        match self.get_value(key).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| KvError::decode(key, err)),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<(), KvError> {
        let value = serde_json::to_value(value).map_err(|err| KvError::encode(key, err))?;
        self.set_value(key, value, options).await
    }
}

/// Which store to talk to, decided once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvBackend {
    Rest { url: String, token: String },
    InMemory,
}

impl KvBackend {
    /// REST credentials select the remote store; anything less falls back to memory.
    pub fn from_settings(settings: &KvSettings) -> Self {
        match (settings.url.as_ref(), settings.token.as_ref()) {
            (Some(url), Some(token)) => KvBackend::Rest {
                url: url.to_string(),
                token: token.clone(),
            },
            _ => KvBackend::InMemory,
        }
    }

    pub fn connect(self, timeout: Duration) -> Result<KvConnection, KvError> {
        match self {
            KvBackend::Rest { url, token } => {
                info!(target = "folio::kv", backend = "rest", "Using REST key-value store");
                let store = RestKv::new(url, token, timeout)?;
                Ok(KvConnection {
                    store: Arc::new(store),
                    memory: None,
                })
            }
            KvBackend::InMemory => {
                info!(target = "folio::kv", backend = "memory", "Using in-memory key-value store");
                Ok(KvConnection::in_memory(Arc::new(MemoryKv::new())))
            }
        }
    }
}

/// The chosen store plus, for the in-memory backend, a handle for inspection.
#[derive(Clone)]
pub struct KvConnection {
    pub store: Arc<dyn KvStore>,
    pub memory: Option<Arc<MemoryKv>>,
}

impl KvConnection {
    pub fn in_memory(memory: Arc<MemoryKv>) -> Self {
        let store: Arc<dyn KvStore> = memory.clone();
        Self {
            store,
            memory: Some(memory),
        }
    }
}

/// Write a sample profile and blurb into an empty in-memory store.
///
/// Returns whether anything was written.
pub async fn seed_development_data(
    memory: &MemoryKv,
    city: &str,
    owner: &str,
    ttl: Duration,
) -> Result<bool, KvError> {
    if !memory.is_empty() {
        return Ok(false);
    }

    let profile = fallback::seed_profile(city, OffsetDateTime::now_utc());
    let blurb = fallback::template_blurb(owner, &profile);
    let store: &dyn KvStore = memory;
    let options = SetOptions::expire_after(ttl);
    store.set(PROFILE_KEY, &profile, options).await?;
    store.set(BLURB_KEY, &blurb, options).await?;

    info!(target = "folio::kv", city, "Seeded development data");
    Ok(true)
}
