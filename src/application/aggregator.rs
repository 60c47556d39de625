//! Profile aggregation: one concurrent pass over the three data providers.
//!
//! Providers already resolve their own upstream failures. The aggregator adds
//! a second deadline and a panic guard around each call, so a misbehaving
//! provider costs at most `provider_timeout` and never aborts the run.

use std::{
    any::Any,
    collections::BTreeMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use folio_api_types::{ArticleFeed, Profile};
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::fallback,
    infra::{
        kv::KvStore,
        providers::{ArticleSource, MusicSource, ProviderKind, WeatherSource, previous_profile},
    },
};

/// Why a provider produced no value within the aggregation run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("timed out after {after_ms} ms")]
    TimedOut { after_ms: u128 },
    #[error("panicked: {message}")]
    Panicked { message: String },
}

/// The three data sources the aggregator fans out to.
#[derive(Clone)]
pub struct ProfileSources {
    pub weather: Arc<dyn WeatherSource>,
    pub articles: Arc<dyn ArticleSource>,
    pub music: Arc<dyn MusicSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Aggregation {
    pub run_id: String,
    pub profile: Profile,
    /// Failure message per provider; empty on a clean run.
    pub failures: BTreeMap<&'static str, String>,
    /// Whether a fresh empty article list was replaced by the persisted one.
    pub preserved_articles: bool,
    pub elapsed_ms: u128,
}

pub struct ProfileAggregator {
    sources: ProfileSources,
    kv: Arc<dyn KvStore>,
    provider_timeout: Duration,
    city: String,
}

impl ProfileAggregator {
    pub fn new(
        sources: ProfileSources,
        kv: Arc<dyn KvStore>,
        provider_timeout: Duration,
        city: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            kv,
            provider_timeout,
            city: city.into(),
        }
    }

    pub async fn aggregate(&self) -> Aggregation {
        let run_id = short_run_id();
        let started = Instant::now();
        info!(target = "folio::profile", run_id = %run_id, "Profile aggregation started");

        let previous = previous_profile(self.kv.as_ref()).await;

        let (weather, articles, music) = tokio::join!(
            guarded(self.provider_timeout, self.sources.weather.weather()),
            guarded(self.provider_timeout, self.sources.articles.articles()),
            guarded(self.provider_timeout, self.sources.music.music()),
        );

        let mut failures = BTreeMap::new();
        let now = OffsetDateTime::now_utc();

        let weather = settle(&run_id, ProviderKind::Weather, weather, &mut failures)
            .or_else(|| previous.as_ref().map(|profile| profile.weather.clone()))
            .unwrap_or_else(|| fallback::default_weather(&self.city));
        let articles = settle(&run_id, ProviderKind::Articles, articles, &mut failures)
            .or_else(|| previous.as_ref().map(|profile| profile.articles.clone()))
            .unwrap_or_else(|| fallback::default_articles(now));
        let music = settle(&run_id, ProviderKind::Music, music, &mut failures)
            .or_else(|| previous.as_ref().map(|profile| profile.music.clone()))
            .unwrap_or_else(|| fallback::default_music(now));

        let (articles, preserved_articles) = preserve_articles(articles, previous.as_ref());
        if preserved_articles {
            info!(
                target = "folio::profile",
                run_id = %run_id,
                "Feed returned no articles, keeping the previous list"
            );
        }

        let elapsed_ms = started.elapsed().as_millis();
        histogram!("folio_profile_run_ms").record(elapsed_ms as f64);

        if failures.is_empty() {
            info!(
                target = "folio::profile",
                run_id = %run_id,
                elapsed_ms,
                "Profile aggregation finished"
            );
        } else {
            warn!(
                target = "folio::profile",
                run_id = %run_id,
                elapsed_ms,
                failed = failures.len(),
                failures = ?failures,
                "Profile aggregation finished with provider failures"
            );
        }

        Aggregation {
            run_id,
            profile: Profile {
                weather,
                articles,
                music,
            },
            failures,
            preserved_articles,
            elapsed_ms,
        }
    }
}

/// Race `call` against `limit`, converting a panic into a failure.
async fn guarded<T, F>(limit: Duration, call: F) -> Result<T, ProviderFailure>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(call).catch_unwind()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => Err(ProviderFailure::Panicked {
            message: panic_message(payload.as_ref()),
        }),
        Err(_) => Err(ProviderFailure::TimedOut {
            after_ms: limit.as_millis(),
        }),
    }
}

fn settle<T>(
    run_id: &str,
    kind: ProviderKind,
    outcome: Result<T, ProviderFailure>,
    failures: &mut BTreeMap<&'static str, String>,
) -> Option<T> {
    match outcome {
        Ok(value) => {
            counter!("folio_provider_success_total", "provider" => kind.as_str()).increment(1);
            info!(
                target = "folio::profile",
                run_id,
                provider = kind.as_str(),
                "Provider succeeded"
            );
            Some(value)
        }
        Err(failure) => {
            counter!("folio_provider_failure_total", "provider" => kind.as_str()).increment(1);
            warn!(
                target = "folio::profile",
                run_id,
                provider = kind.as_str(),
                error = %failure,
                "Provider failed, substituting previous value or default"
            );
            failures.insert(kind.as_str(), failure.to_string());
            None
        }
    }
}

fn preserve_articles(fresh: ArticleFeed, previous: Option<&Profile>) -> (ArticleFeed, bool) {
    if !fresh.articles.is_empty() {
        return (fresh, false);
    }
    match previous {
        Some(profile) if !profile.articles.articles.is_empty() => (profile.articles.clone(), true),
        _ => (fresh, false),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn short_run_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn guard_times_out_slow_calls() {
        let outcome = guarded(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            1
        })
        .await;
        assert_eq!(outcome, Err(ProviderFailure::TimedOut { after_ms: 100 }));
    }

    #[tokio::test]
    async fn guard_catches_panics() {
        let outcome: Result<u8, _> = guarded(Duration::from_secs(1), async {
            if true {
                panic!("feed exploded");
            }
            0
        })
        .await;
        assert_eq!(
            outcome,
            Err(ProviderFailure::Panicked {
                message: "feed exploded".to_string()
            })
        );
    }

    #[test]
    fn empty_fresh_articles_keep_previous_list() {
        let now = OffsetDateTime::now_utc();
        let mut previous = fallback::seed_profile("Atlanta", now);
        previous.articles = fallback::default_articles(now);

        let fresh = ArticleFeed {
            articles: Vec::new(),
            last_updated: now,
        };
        let (kept, preserved) = preserve_articles(fresh, Some(&previous));
        assert!(preserved);
        assert_eq!(kept, previous.articles);
    }

    #[test]
    fn empty_articles_stay_empty_without_history() {
        let fresh = ArticleFeed {
            articles: Vec::new(),
            last_updated: OffsetDateTime::now_utc(),
        };
        let (kept, preserved) = preserve_articles(fresh, None);
        assert!(!preserved);
        assert!(kept.articles.is_empty());
    }

    #[test]
    fn run_ids_are_short() {
        assert_eq!(short_run_id().len(), 8);
    }
}
