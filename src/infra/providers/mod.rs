//! Upstream data providers.
//!
//! Every provider resolves to a value: an upstream failure walks the fallback
//! chain (persisted profile, stale development cache, literal default) instead
//! of surfacing an error. [`ProviderError`] only exists between the HTTP call
//! and that chain.

mod blurb;
mod feed;
mod music;
mod weather;

use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;
use folio_api_types::{ArticleFeed, MusicActivity, Profile, Weather};
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    cache::ProviderCache,
    infra::kv::{KvStore, PROFILE_KEY},
};

pub use blurb::{OpenAiBlurb, default_system_prompt};
pub use feed::FeedlyClient;
pub use music::SpotifyClient;
pub use weather::OpenMeteoClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    MissingConfiguration(&'static str),
    #[error("request failed: {0}")]
    Http(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: String },
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u128 },
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("completion was empty")]
    EmptyCompletion,
}

impl ProviderError {
    pub fn http(err: impl fmt::Display) -> Self {
        Self::Http(err.to_string())
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Weather,
    Articles,
    Music,
    Blurb,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Weather => "weather",
            ProviderKind::Articles => "articles",
            ProviderKind::Music => "music",
            ProviderKind::Blurb => "blurb",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn weather(&self) -> Weather;
}

#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn articles(&self) -> ArticleFeed;
}

#[async_trait]
pub trait MusicSource: Send + Sync {
    async fn music(&self) -> MusicActivity;
}

#[async_trait]
pub trait BlurbSource: Send + Sync {
    async fn blurb(&self, profile: &Profile) -> String;
}

/// Shared HTTP client for outbound provider calls. Deadlines are applied per call.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// `path` appended to whatever path `base` already carries, query dropped.
pub(crate) fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url.set_query(None);
    url
}

/// Race `call` against `limit`; a timeout drops the in-flight request.
pub(crate) async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout {
            after_ms: limit.as_millis(),
        }))
}

/// Read the persisted profile, treating a read failure as absence.
pub async fn previous_profile(kv: &dyn KvStore) -> Option<Profile> {
    match kv.get::<Profile>(PROFILE_KEY).await {
        Ok(profile) => profile,
        Err(err) => {
            warn!(
                target = "folio::kv",
                error = %err,
                "Failed to read persisted profile"
            );
            None
        }
    }
}

/// Per-provider wiring of the development cache and the persisted fallback.
pub(crate) struct FallbackChain<'a, T> {
    pub kind: ProviderKind,
    pub kv: &'a dyn KvStore,
    pub cache: &'a ProviderCache<T>,
    pub cache_key: &'a str,
}

impl<T: Clone> FallbackChain<'_, T> {
    pub async fn resolve<F>(
        self,
        fetch: F,
        from_previous: impl FnOnce(Profile) -> T,
        default: impl FnOnce() -> T,
    ) -> T
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if let Some(cached) = self.cache.fresh(self.cache_key) {
            return cached;
        }

        let error = match fetch.await {
            Ok(value) => {
                self.cache.store(self.cache_key, value.clone());
                return value;
            }
            Err(error) => error,
        };

        warn!(
            target = "folio::provider",
            provider = self.kind.as_str(),
            error = %error,
            "Provider call failed, using fallback"
        );

        if let Some(profile) = previous_profile(self.kv).await {
            info!(
                target = "folio::provider",
                provider = self.kind.as_str(),
                fallback = "persisted",
                "Using persisted profile value"
            );
            return from_previous(profile);
        }

        if let Some(stale) = self.cache.stale(self.cache_key) {
            info!(
                target = "folio::provider",
                provider = self.kind.as_str(),
                fallback = "stale_cache",
                "Using stale cached value"
            );
            return stale;
        }

        info!(
            target = "folio::provider",
            provider = self.kind.as_str(),
            fallback = "default",
            "Using literal default"
        );
        default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        cache::DevCacheConfig,
        domain::fallback,
        infra::kv::{MemoryKv, SetOptions},
    };

    use super::*;

    #[test]
    fn endpoint_keeps_the_base_path_prefix() {
        let root = Url::parse("https://api.example.com").expect("url");
        assert_eq!(
            endpoint(&root, "/v1/forecast").as_str(),
            "https://api.example.com/v1/forecast"
        );

        let proxied = Url::parse("https://gateway.example.com/openai/").expect("url");
        assert_eq!(
            endpoint(&proxied, "/v1/chat/completions").as_str(),
            "https://gateway.example.com/openai/v1/chat/completions"
        );

        let unslashed = Url::parse("https://gateway.example.com/spotify?x=1").expect("url");
        assert_eq!(
            endpoint(&unslashed, "v1/me/player/recently-played").as_str(),
            "https://gateway.example.com/spotify/v1/me/player/recently-played"
        );
    }

    fn chain<'a>(kv: &'a dyn KvStore, cache: &'a ProviderCache<Weather>) -> FallbackChain<'a, Weather> {
        FallbackChain {
            kind: ProviderKind::Weather,
            kv,
            cache,
            cache_key: "weather",
        }
    }

    async fn failing() -> Result<Weather, ProviderError> {
        Err(ProviderError::Status { status: 503 })
    }

    #[tokio::test]
    async fn persisted_value_wins_over_stale_cache() {
        let memory = Arc::new(MemoryKv::new());
        let kv: Arc<dyn KvStore> = memory;
        let mut persisted = fallback::seed_profile("Atlanta", time::OffsetDateTime::now_utc());
        persisted.weather.condition = "Persisted".to_string();
        kv.set(PROFILE_KEY, &persisted, SetOptions::default())
            .await
            .expect("seed");

        let cache = ProviderCache::new(
            "weather",
            DevCacheConfig::enabled(Duration::from_secs(0)),
        );
        let mut stale = fallback::default_weather("Atlanta");
        stale.condition = "Stale".to_string();
        cache.store("weather", stale);

        let weather = chain(kv.as_ref(), &cache)
            .resolve(failing(), |p| p.weather, || fallback::default_weather("Atlanta"))
            .await;
        assert_eq!(weather.condition, "Persisted");
    }

    #[tokio::test]
    async fn stale_cache_precedes_default() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let cache = ProviderCache::new(
            "weather",
            DevCacheConfig::enabled(Duration::from_secs(0)),
        );
        let mut stale = fallback::default_weather("Atlanta");
        stale.condition = "Stale".to_string();
        cache.store("weather", stale);

        let weather = chain(kv.as_ref(), &cache)
            .resolve(failing(), |p| p.weather, || fallback::default_weather("Atlanta"))
            .await;
        assert_eq!(weather.condition, "Stale");
    }

    #[tokio::test]
    async fn default_when_nothing_else_exists() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let cache = ProviderCache::new("weather", DevCacheConfig::default());

        let weather = chain(kv.as_ref(), &cache)
            .resolve(failing(), |p| p.weather, || fallback::default_weather("Macon"))
            .await;
        assert_eq!(weather, fallback::default_weather("Macon"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_timeout_error() {
        let result: Result<(), ProviderError> = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout { after_ms: 50 })));
    }
}
