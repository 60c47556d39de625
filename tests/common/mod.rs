#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use folio::{
    application::{
        aggregator::{ProfileAggregator, ProfileSources},
        invalidation::PageInvalidator,
        profile_job::ProfileJob,
    },
    domain::fallback,
    infra::{
        kv::{KvError, KvStore, MemoryKv, SetOptions},
        providers::{ArticleSource, BlurbSource, MusicSource, WeatherSource},
    },
};
use folio_api_types::{
    Article, ArticleFeed, HumidityBand, MusicActivity, Profile, Track, Weather,
};
use serde_json::Value;
use time::OffsetDateTime;

pub const CITY: &str = "Atlanta";
pub const PROVIDER_TIMEOUT: Duration = Duration::from_millis(200);
pub const TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn sunny_weather() -> Weather {
    Weather {
        temperature: 71.3,
        temperature_high: 78.0,
        temperature_low: 60.1,
        condition: "Clear Sky".to_string(),
        city: CITY.to_string(),
        mean_humidity: 42,
        humidity_classification: HumidityBand::Comfortable,
        precipitation_prob: 5,
    }
}

pub fn article(title: &str) -> Article {
    Article {
        title: title.to_string(),
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        date: 1_700_000_000_000,
        source: Some("Example Wire".to_string()),
        image_url: None,
        excerpt: None,
    }
}

pub fn feed(titles: &[&str]) -> ArticleFeed {
    ArticleFeed {
        articles: titles.iter().map(|title| article(title)).collect(),
        last_updated: OffsetDateTime::now_utc(),
    }
}

pub fn playing(title: &str, artist: &str) -> MusicActivity {
    let now = OffsetDateTime::now_utc();
    MusicActivity {
        track: Some(Track {
            title: title.to_string(),
            artist: artist.to_string(),
            album: "Singles".to_string(),
            cover_url: "https://img.example/cover.jpg".to_string(),
            track_url: "https://open.example/track/1".to_string(),
            played_at: now,
        }),
        last_updated: now,
    }
}

/// A source that answers with a fixed value, optionally after a delay.
pub struct Fixed<T> {
    value: T,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<T> Fixed<T> {
    pub fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(value: T, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            value,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> T
    where
        T: Clone,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.value.clone()
    }
}

#[async_trait]
impl WeatherSource for Fixed<Weather> {
    async fn weather(&self) -> Weather {
        self.answer().await
    }
}

#[async_trait]
impl ArticleSource for Fixed<ArticleFeed> {
    async fn articles(&self) -> ArticleFeed {
        self.answer().await
    }
}

#[async_trait]
impl MusicSource for Fixed<MusicActivity> {
    async fn music(&self) -> MusicActivity {
        self.answer().await
    }
}

/// Music source that panics mid-call.
pub struct Exploding;

#[async_trait]
impl MusicSource for Exploding {
    async fn music(&self) -> MusicActivity {
        panic!("music client exploded");
    }
}

/// Blurb source that renders the template for whatever profile it is given.
pub struct TemplateBlurb {
    calls: AtomicUsize,
}

impl TemplateBlurb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlurbSource for TemplateBlurb {
    async fn blurb(&self, profile: &Profile) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fallback::template_blurb("Sam", profile)
    }
}

/// Store whose reads and writes all fail; counts write attempts.
#[derive(Default)]
pub struct BrokenKv {
    writes: AtomicUsize,
}

impl BrokenKv {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for BrokenKv {
    async fn get_value(&self, _key: &str) -> Result<Option<Value>, KvError> {
        Err(KvError::transport("connection refused"))
    }

    async fn set_value(
        &self,
        _key: &str,
        _value: Value,
        _options: SetOptions,
    ) -> Result<(), KvError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(KvError::transport("connection refused"))
    }
}

pub fn healthy_sources() -> ProfileSources {
    ProfileSources {
        weather: Fixed::new(sunny_weather()),
        articles: Fixed::new(feed(&["Rust in Production", "Async Pitfalls"])),
        music: Fixed::new(playing("Blue in Green", "Miles Davis")),
    }
}

pub fn job_with(sources: ProfileSources, kv: Arc<dyn KvStore>) -> ProfileJob {
    let aggregator = ProfileAggregator::new(sources, kv.clone(), PROVIDER_TIMEOUT, CITY);
    ProfileJob::new(
        aggregator,
        TemplateBlurb::new(),
        kv,
        TTL,
        PageInvalidator::default(),
    )
}

pub fn memory_store() -> (Arc<MemoryKv>, Arc<dyn KvStore>) {
    let memory = Arc::new(MemoryKv::new());
    let store: Arc<dyn KvStore> = memory.clone();
    (memory, store)
}
