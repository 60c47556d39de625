//! Development-only inspection routes. Every handler answers 403 outside development.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use folio_api_types::{ArticleFeed, Profile, Weather};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    application::error::HttpError,
    infra::{
        kv::{BLURB_KEY, KvError, MemoryKvView, PROFILE_KEY},
        providers::{ArticleSource, ProviderError, WeatherSource},
    },
};

use super::{DebugSources, HttpState};

const SOURCE: &str = "infra::http::debug";

pub(super) fn router() -> Router<HttpState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/weather", get(weather))
        .route("/weather-raw", get(weather_raw))
        .route("/feed", get(feed))
        .route("/feed-raw", get(feed_raw))
}

fn sources(state: &HttpState) -> Result<&DebugSources, HttpError> {
    match (&state.debug, state.environment.is_development()) {
        (Some(sources), true) => Ok(sources),
        _ => Err(HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Debug endpoints only available in development",
            format!("debug route requested in {}", state.environment),
        )),
    }
}

#[derive(Serialize)]
struct ProfileDebug {
    profile: Option<Profile>,
    blurb: Option<String>,
    memory: Option<MemoryKvView>,
    environment: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

async fn profile(State(state): State<HttpState>) -> Response {
    if let Err(rejection) = sources(&state) {
        return rejection.into_response();
    }

    let read = async {
        let profile = state.kv.get::<Profile>(PROFILE_KEY).await?;
        let blurb = state.kv.get::<String>(BLURB_KEY).await?;
        Ok::<_, KvError>((profile, blurb))
    };
    match read.await {
        Ok((profile, blurb)) => Json(ProfileDebug {
            profile,
            blurb,
            memory: state.memory.as_ref().map(|memory| memory.inspect()),
            environment: state.environment.as_str(),
            timestamp: OffsetDateTime::now_utc(),
        })
        .into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.to_string(),
            &err,
        )
        .into_response(),
    }
}

#[derive(Serialize)]
struct WeatherDebug {
    ok: bool,
    weather: Weather,
}

async fn weather(State(state): State<HttpState>) -> Response {
    match sources(&state) {
        Ok(sources) => Json(WeatherDebug {
            ok: true,
            weather: sources.weather.weather().await,
        })
        .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

#[derive(Serialize)]
struct FeedDebug {
    ok: bool,
    articles: ArticleFeed,
}

async fn feed(State(state): State<HttpState>) -> Response {
    match sources(&state) {
        Ok(sources) => Json(FeedDebug {
            ok: true,
            articles: sources.feed.articles().await,
        })
        .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

#[derive(Serialize)]
struct RawMeta {
    url: String,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

#[derive(Serialize)]
struct RawDebug {
    ok: bool,
    raw_api_response: Value,
    meta: RawMeta,
}

fn raw_response(url: String, result: Result<Value, ProviderError>) -> Response {
    match result {
        Ok(raw) => Json(RawDebug {
            ok: true,
            raw_api_response: raw,
            meta: RawMeta {
                url,
                timestamp: OffsetDateTime::now_utc(),
            },
        })
        .into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.to_string(),
            &err,
        )
        .into_response(),
    }
}

async fn weather_raw(State(state): State<HttpState>) -> Response {
    let sources = match sources(&state) {
        Ok(sources) => sources,
        Err(rejection) => return rejection.into_response(),
    };
    let url = sources.weather.forecast_url().to_string();
    raw_response(url, sources.weather.fetch_raw().await)
}

async fn feed_raw(State(state): State<HttpState>) -> Response {
    let sources = match sources(&state) {
        Ok(sources) => sources,
        Err(rejection) => return rejection.into_response(),
    };
    let url = match sources.feed.feed_url() {
        Ok(url) => url.to_string(),
        Err(err) => return raw_response(String::new(), Err(err)),
    };
    raw_response(url, sources.feed.fetch_raw().await)
}
