//! Literal values used when neither an upstream provider nor the persisted
//! profile can supply data.

use std::fmt::Write as _;

use folio_api_types::{Article, ArticleFeed, HumidityBand, MusicActivity, Profile, Weather};
use time::{Duration, OffsetDateTime};

const FALLBACK_SOURCE: &str = "Example Source";

pub fn default_weather(city: &str) -> Weather {
    Weather {
        temperature: 75.5,
        temperature_high: 80.0,
        temperature_low: 65.0,
        condition: "Unknown".to_string(),
        city: city.to_string(),
        mean_humidity: 50,
        humidity_classification: HumidityBand::Comfortable,
        precipitation_prob: 0,
    }
}

/// Two placeholder articles dated one and two days before `now`.
pub fn default_articles(now: OffsetDateTime) -> ArticleFeed {
    let placeholder = |index: i64| Article {
        title: format!("Fallback Article {index}"),
        url: format!("https://example.com/article{index}"),
        date: epoch_millis(now - Duration::days(index)),
        source: Some(FALLBACK_SOURCE.to_string()),
        image_url: None,
        excerpt: None,
    };

    ArticleFeed {
        articles: vec![placeholder(1), placeholder(2)],
        last_updated: now,
    }
}

pub fn default_music(now: OffsetDateTime) -> MusicActivity {
    MusicActivity {
        track: None,
        last_updated: now,
    }
}

/// Sentence built from the profile alone, used when no generated or stored blurb exists.
pub fn template_blurb(owner: &str, profile: &Profile) -> String {
    let weather = &profile.weather;
    let mut sentence = format!(
        "{owner} is currently in {} where it's {}°F and {}",
        weather.city,
        weather.temperature,
        weather.condition.to_lowercase()
    );

    if let Some(article) = profile.articles.latest() {
        let _ = write!(sentence, ", reading about \"{}\"", article.title);
    }
    if let Some(track) = profile.music.track.as_ref() {
        let _ = write!(
            sentence,
            ", listening to \"{}\" by {}",
            track.title, track.artist
        );
    }

    sentence.push('.');
    sentence
}

/// Sample profile written into an empty development store.
pub fn seed_profile(city: &str, now: OffsetDateTime) -> Profile {
    Profile {
        weather: Weather {
            temperature: 75.5,
            temperature_high: 84.2,
            temperature_low: 62.8,
            condition: "Partly Cloudy".to_string(),
            city: city.to_string(),
            mean_humidity: 68,
            humidity_classification: HumidityBand::SomewhatHumid,
            precipitation_prob: 30,
        },
        articles: ArticleFeed {
            articles: Vec::new(),
            last_updated: now,
        },
        music: default_music(now),
    }
}

pub fn epoch_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use folio_api_types::Track;
    use time::macros::datetime;

    use super::*;

    fn profile_with(articles: Vec<Article>, track: Option<Track>) -> Profile {
        let now = datetime!(2025-05-01 12:00 UTC);
        let mut weather = default_weather("Atlanta");
        weather.temperature = 72.0;
        weather.condition = "Partly Cloudy".to_string();
        Profile {
            weather,
            articles: ArticleFeed {
                articles,
                last_updated: now,
            },
            music: MusicActivity {
                track,
                last_updated: now,
            },
        }
    }

    #[test]
    fn template_mentions_every_available_activity() {
        let article = Article {
            title: "Rust in Production".to_string(),
            url: "https://example.com/rust".to_string(),
            date: 0,
            source: None,
            image_url: None,
            excerpt: None,
        };
        let track = Track {
            title: "Teardrop".to_string(),
            artist: "Massive Attack".to_string(),
            album: "Mezzanine".to_string(),
            cover_url: String::new(),
            track_url: String::new(),
            played_at: datetime!(2025-05-01 11:00 UTC),
        };

        let blurb = template_blurb("Jason", &profile_with(vec![article], Some(track)));
        assert_eq!(
            blurb,
            "Jason is currently in Atlanta where it's 72°F and partly cloudy, reading about \"Rust in Production\", listening to \"Teardrop\" by Massive Attack."
        );
    }

    #[test]
    fn template_without_activity_still_names_city() {
        let blurb = template_blurb("Jason", &profile_with(Vec::new(), None));
        assert_eq!(
            blurb,
            "Jason is currently in Atlanta where it's 72°F and partly cloudy."
        );
    }

    #[test]
    fn default_articles_are_dated_in_the_past() {
        let now = datetime!(2025-05-03 00:00 UTC);
        let feed = default_articles(now);
        assert_eq!(feed.articles.len(), 2);
        assert_eq!(
            feed.articles[0].date,
            epoch_millis(datetime!(2025-05-02 00:00 UTC))
        );
        assert_eq!(
            feed.articles[1].date,
            epoch_millis(datetime!(2025-05-01 00:00 UTC))
        );
    }

    #[test]
    fn default_weather_uses_configured_city() {
        let weather = default_weather("Savannah");
        assert_eq!(weather.city, "Savannah");
        assert_eq!(weather.temperature, 75.5);
        assert_eq!(weather.humidity_classification, HumidityBand::Comfortable);
    }
}
