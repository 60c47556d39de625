use std::sync::Arc;

use async_trait::async_trait;
use folio_api_types::{MusicActivity, Track};
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{cache::DevCaches, config::MusicSettings, domain::fallback, infra::kv::KvStore};

use super::{
    FallbackChain, MusicSource, ProviderError, ProviderKind, endpoint, with_deadline,
};

const CACHE_KEY: &str = "spotify-recently-played";
const DEFAULT_RETRY_AFTER: &str = "30";

/// Most recently played track from Spotify, via the refresh-token grant.
pub struct SpotifyClient {
    http: Client,
    settings: MusicSettings,
    kv: Arc<dyn KvStore>,
    caches: Arc<DevCaches>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RecentlyPlayed {
    #[serde(default)]
    items: Vec<PlayHistory>,
}

#[derive(Debug, Deserialize)]
struct PlayHistory {
    track: SpotifyTrack,
    #[serde(with = "time::serde::rfc3339")]
    played_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    artists: Vec<Named>,
    album: Album,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: String,
}

struct Credentials<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

impl SpotifyClient {
    pub fn new(
        http: Client,
        settings: MusicSettings,
        kv: Arc<dyn KvStore>,
        caches: Arc<DevCaches>,
    ) -> Self {
        Self {
            http,
            settings,
            kv,
            caches,
        }
    }

    fn credentials(&self) -> Result<Credentials<'_>, ProviderError> {
        let client_id = self
            .settings
            .client_id
            .as_deref()
            .ok_or(ProviderError::MissingConfiguration("music.client_id"))?;
        let client_secret = self
            .settings
            .client_secret
            .as_deref()
            .ok_or(ProviderError::MissingConfiguration("music.client_secret"))?;
        let refresh_token = self
            .settings
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::MissingConfiguration("music.refresh_token"))?;
        Ok(Credentials {
            client_id,
            client_secret,
            refresh_token,
        })
    }

    async fn access_token(&self, credentials: &Credentials<'_>) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.settings.token_url.clone())
            .basic_auth(credentials.client_id, Some(credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token),
            ])
            .send()
            .await
            .map_err(ProviderError::http)?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
            });
        }

        let token: TokenResponse = response.json().await.map_err(ProviderError::decode)?;
        Ok(token.access_token)
    }

    async fn recently_played(&self, access_token: &str) -> Result<Option<Track>, ProviderError> {
        let mut url = endpoint(&self.settings.api_base_url, "/v1/me/player/recently-played");
        url.query_pairs_mut().clear().append_pair("limit", "1");

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ProviderError::http)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .to_string();
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let history: RecentlyPlayed = response.json().await.map_err(ProviderError::decode)?;
        Ok(history.items.into_iter().next().map(normalize_play))
    }

    /// Token refresh and history lookup under one deadline, without fallback.
    pub async fn fetch(&self) -> Result<MusicActivity, ProviderError> {
        let credentials = self.credentials()?;
        with_deadline(self.settings.timeout, async {
            let token = self.access_token(&credentials).await?;
            let track = self.recently_played(&token).await?;
            Ok(MusicActivity {
                track,
                last_updated: OffsetDateTime::now_utc(),
            })
        })
        .await
    }
}

#[async_trait]
impl MusicSource for SpotifyClient {
    async fn music(&self) -> MusicActivity {
        FallbackChain {
            kind: ProviderKind::Music,
            kv: self.kv.as_ref(),
            cache: &self.caches.music,
            cache_key: CACHE_KEY,
        }
        .resolve(
            self.fetch(),
            |profile| profile.music,
            || fallback::default_music(OffsetDateTime::now_utc()),
        )
        .await
    }
}

fn normalize_play(play: PlayHistory) -> Track {
    let PlayHistory { track, played_at } = play;
    Track {
        title: track.name,
        artist: track
            .artists
            .into_iter()
            .map(|artist| artist.name)
            .collect::<Vec<_>>()
            .join(", "),
        album: track.album.name,
        cover_url: track
            .album
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .unwrap_or_default(),
        track_url: track.external_urls.spotify,
        played_at,
    }
}
