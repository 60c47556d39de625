use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Normalized weather for the configured city. Temperatures are Fahrenheit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature: f64,
    pub temperature_high: f64,
    pub temperature_low: f64,
    pub condition: String,
    pub city: String,
    /// Daily mean relative humidity, 0-100.
    pub mean_humidity: u8,
    pub humidity_classification: HumidityBand,
    /// Maximum precipitation probability for the day, 0-100.
    pub precipitation_prob: u8,
}

/// Five ordered humidity bands derived from a relative humidity percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HumidityBand {
    #[serde(rename = "Dry")]
    Dry,
    #[serde(rename = "Comfortable")]
    Comfortable,
    #[serde(rename = "Somewhat Humid")]
    SomewhatHumid,
    #[serde(rename = "Humid")]
    Humid,
    #[serde(rename = "Muggy")]
    Muggy,
}

impl HumidityBand {
    /// Classify a humidity percentage. Each band's upper bound is inclusive.
    pub fn classify(percent: u8) -> Self {
        match percent {
            0..=30 => HumidityBand::Dry,
            31..=50 => HumidityBand::Comfortable,
            51..=70 => HumidityBand::SomewhatHumid,
            71..=80 => HumidityBand::Humid,
            _ => HumidityBand::Muggy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HumidityBand::Dry => "Dry",
            HumidityBand::Comfortable => "Comfortable",
            HumidityBand::SomewhatHumid => "Somewhat Humid",
            HumidityBand::Humid => "Humid",
            HumidityBand::Muggy => "Muggy",
        }
    }
}

impl fmt::Display for HumidityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recently read article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    /// Publish time in Unix epoch milliseconds.
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFeed {
    pub articles: Vec<Article>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl ArticleFeed {
    pub fn latest(&self) -> Option<&Article> {
        self.articles.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: String,
    pub track_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub played_at: OffsetDateTime,
}

/// Most recently played track, if any. No track is a legitimate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicActivity {
    pub track: Option<Track>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// The aggregated record persisted under the `profile` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub weather: Weather,
    pub articles: ArticleFeed,
    pub music: MusicActivity,
}

/// What readers see: the persisted profile and blurb, either of which may be
/// absent after a cold start or once their TTL lapses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub profile: Option<Profile>,
    pub blurb: Option<String>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.blurb.is_none()
    }
}
