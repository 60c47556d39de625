//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use cron::Schedule;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{CliArgs, Command, RefreshArgs, RuntimeOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const ENV_PREFIX: &str = "FOLIO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_KV_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LATITUDE: f64 = 33.749;
const DEFAULT_LONGITUDE: f64 = -84.388;
const DEFAULT_CITY: &str = "Atlanta";
const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";
const DEFAULT_PROVIDER_HTTP_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_FEED_COUNT: u32 = 5;
const MAX_FEED_COUNT: u32 = 100;
const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_BLURB_MODEL: &str = "gpt-4-turbo";
const DEFAULT_BLURB_TIMEOUT_MS: u64 = 12_000;
const DEFAULT_OWNER_NAME: &str = "Jason";
const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_PROFILE_TTL_SECS: u64 = 48 * 60 * 60;
const DEFAULT_AGGREGATOR_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DEV_CACHE_SECS: u64 = 15 * 60;
const DEFAULT_RESPONSE_CACHE_SECS: u64 = 60;
pub(crate) const DEFAULT_CRON_SCHEDULE: &str = "0 0 * * * *";
const DEFAULT_REVALIDATE_PATH: &str = "/";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub kv: KvSettings,
    pub weather: WeatherSettings,
    pub feed: FeedSettings,
    pub music: MusicSettings,
    pub blurb: BlurbSettings,
    pub profile: ProfileSettings,
    pub cron: CronSettings,
    pub revalidate: RevalidateSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub environment: AppEnvironment,
}

/// Development turns on the provider cache, store seeding and the debug routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    Development,
    #[default]
    Production,
}

impl AppEnvironment {
    pub fn is_development(self) -> bool {
        matches!(self, AppEnvironment::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
        }
    }
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnvironment::Development),
            "production" | "prod" => Ok(AppEnvironment::Production),
            other => Err(format!(
                "unknown environment `{other}`, expected development or production"
            )),
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub url: Option<Url>,
    pub token: Option<String>,
    pub seed_development_data: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: Option<Url>,
    pub count: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MusicSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub token_url: Url,
    pub api_base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BlurbSettings {
    pub api_key: Option<String>,
    pub api_base_url: Url,
    pub model: String,
    pub timeout: Duration,
    pub prompt_url: Option<Url>,
    pub owner_name: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct ProfileSettings {
    /// Expiry attached to every persisted profile and blurb.
    pub ttl: Duration,
    /// Secondary deadline the aggregator races each provider against.
    pub provider_timeout: Duration,
    pub dev_cache: Duration,
    /// Lifetime of a cached `/api/profile` response, never longer than `ttl`.
    pub response_cache: Duration,
}

#[derive(Debug, Clone)]
pub struct CronSettings {
    pub secret: Option<String>,
    pub enabled: bool,
    pub schedule: Schedule,
}

#[derive(Debug, Clone)]
pub struct RevalidateSettings {
    pub url: Option<Url>,
    pub token: Option<String>,
    pub paths: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("revalidate.paths"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Refresh(args)) => raw.apply_runtime_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    app: RawAppSettings,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    kv: RawKvSettings,
    weather: RawWeatherSettings,
    feed: RawFeedSettings,
    music: RawMusicSettings,
    blurb: RawBlurbSettings,
    profile: RawProfileSettings,
    cron: RawCronSettings,
    revalidate: RawRevalidateSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_runtime_overrides(&overrides.runtime);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(enabled) = overrides.cron_enabled {
            self.cron.enabled = Some(enabled);
        }
        if let Some(schedule) = overrides.cron_schedule.as_ref() {
            self.cron.schedule = Some(schedule.clone());
        }
    }

    fn apply_runtime_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(environment) = overrides.environment.as_ref() {
            self.app.environment = Some(environment.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.kv_url.as_ref() {
            self.kv.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            app,
            server,
            logging,
            kv,
            weather,
            feed,
            music,
            blurb,
            profile,
            cron,
            revalidate,
        } = raw;

        Ok(Self {
            app: build_app_settings(app)?,
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            kv: build_kv_settings(kv)?,
            weather: build_weather_settings(weather)?,
            feed: build_feed_settings(feed)?,
            music: build_music_settings(music)?,
            blurb: build_blurb_settings(blurb)?,
            profile: build_profile_settings(profile)?,
            cron: build_cron_settings(cron)?,
            revalidate: build_revalidate_settings(revalidate)?,
        })
    }
}

fn build_app_settings(app: RawAppSettings) -> Result<AppSettings, LoadError> {
    let environment = match app.environment {
        Some(value) => AppEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("app.environment", reason))?,
        None => AppEnvironment::default(),
    };
    Ok(AppSettings { environment })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_kv_settings(kv: RawKvSettings) -> Result<KvSettings, LoadError> {
    Ok(KvSettings {
        url: optional_url(kv.url, "kv.url")?,
        token: non_empty(kv.token),
        seed_development_data: kv.seed_development_data.unwrap_or(true),
        timeout: millis(kv.timeout_ms, DEFAULT_KV_TIMEOUT_MS, "kv.timeout_ms")?,
    })
}

fn build_weather_settings(weather: RawWeatherSettings) -> Result<WeatherSettings, LoadError> {
    let latitude = weather.latitude.unwrap_or(DEFAULT_LATITUDE);
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(LoadError::invalid(
            "weather.latitude",
            format!("{latitude} is outside -90..=90"),
        ));
    }

    let longitude = weather.longitude.unwrap_or(DEFAULT_LONGITUDE);
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(LoadError::invalid(
            "weather.longitude",
            format!("{longitude} is outside -180..=180"),
        ));
    }

    let city = non_empty(weather.city).unwrap_or_else(|| DEFAULT_CITY.to_string());

    Ok(WeatherSettings {
        latitude,
        longitude,
        city,
        base_url: url_or_default(weather.base_url, DEFAULT_WEATHER_BASE_URL, "weather.base_url")?,
        timeout: millis(
            weather.timeout_ms,
            DEFAULT_PROVIDER_HTTP_TIMEOUT_MS,
            "weather.timeout_ms",
        )?,
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, LoadError> {
    let count = feed.count.unwrap_or(DEFAULT_FEED_COUNT);
    if count == 0 || count > MAX_FEED_COUNT {
        return Err(LoadError::invalid(
            "feed.count",
            format!("must be between 1 and {MAX_FEED_COUNT}"),
        ));
    }

    Ok(FeedSettings {
        url: optional_url(feed.url, "feed.url")?,
        count,
        timeout: millis(
            feed.timeout_ms,
            DEFAULT_PROVIDER_HTTP_TIMEOUT_MS,
            "feed.timeout_ms",
        )?,
    })
}

fn build_music_settings(music: RawMusicSettings) -> Result<MusicSettings, LoadError> {
    Ok(MusicSettings {
        client_id: non_empty(music.client_id),
        client_secret: non_empty(music.client_secret),
        refresh_token: non_empty(music.refresh_token),
        token_url: url_or_default(music.token_url, DEFAULT_SPOTIFY_TOKEN_URL, "music.token_url")?,
        api_base_url: url_or_default(
            music.api_base_url,
            DEFAULT_SPOTIFY_API_BASE_URL,
            "music.api_base_url",
        )?,
        timeout: millis(
            music.timeout_ms,
            DEFAULT_PROVIDER_HTTP_TIMEOUT_MS,
            "music.timeout_ms",
        )?,
    })
}

fn build_blurb_settings(blurb: RawBlurbSettings) -> Result<BlurbSettings, LoadError> {
    let timezone_name = non_empty(blurb.timezone).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = Tz::from_str(&timezone_name).map_err(|_| {
        LoadError::invalid("blurb.timezone", format!("unknown time zone `{timezone_name}`"))
    })?;

    Ok(BlurbSettings {
        api_key: non_empty(blurb.api_key),
        api_base_url: url_or_default(
            blurb.api_base_url,
            DEFAULT_OPENAI_BASE_URL,
            "blurb.api_base_url",
        )?,
        model: non_empty(blurb.model).unwrap_or_else(|| DEFAULT_BLURB_MODEL.to_string()),
        timeout: millis(blurb.timeout_ms, DEFAULT_BLURB_TIMEOUT_MS, "blurb.timeout_ms")?,
        prompt_url: optional_url(blurb.prompt_url, "blurb.prompt_url")?,
        owner_name: non_empty(blurb.owner_name).unwrap_or_else(|| DEFAULT_OWNER_NAME.to_string()),
        timezone,
    })
}

fn build_profile_settings(profile: RawProfileSettings) -> Result<ProfileSettings, LoadError> {
    let ttl = seconds(
        profile.ttl_seconds,
        DEFAULT_PROFILE_TTL_SECS,
        "profile.ttl_seconds",
    )?;
    let response_cache = seconds(
        profile.response_cache_seconds,
        DEFAULT_RESPONSE_CACHE_SECS,
        "profile.response_cache_seconds",
    )?;
    Ok(ProfileSettings {
        ttl,
        provider_timeout: millis(
            profile.provider_timeout_ms,
            DEFAULT_AGGREGATOR_TIMEOUT_MS,
            "profile.provider_timeout_ms",
        )?,
        dev_cache: seconds(
            profile.dev_cache_seconds,
            DEFAULT_DEV_CACHE_SECS,
            "profile.dev_cache_seconds",
        )?,
        response_cache: response_cache.min(ttl),
    })
}

fn build_cron_settings(cron: RawCronSettings) -> Result<CronSettings, LoadError> {
    let expression = non_empty(cron.schedule).unwrap_or_else(|| DEFAULT_CRON_SCHEDULE.to_string());
    let schedule = Schedule::from_str(&expression).map_err(|err| {
        LoadError::invalid("cron.schedule", format!("`{expression}` is not valid: {err}"))
    })?;

    Ok(CronSettings {
        secret: non_empty(cron.secret),
        enabled: cron.enabled.unwrap_or(false),
        schedule,
    })
}

fn build_revalidate_settings(
    revalidate: RawRevalidateSettings,
) -> Result<RevalidateSettings, LoadError> {
    let url = optional_url(revalidate.url, "revalidate.url")?;
    let token = non_empty(revalidate.token);
    if url.is_some() && token.is_none() {
        return Err(LoadError::invalid(
            "revalidate.token",
            "required when revalidate.url is set",
        ));
    }

    let paths = match revalidate.paths {
        Some(paths) => paths
            .into_iter()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .collect::<Vec<_>>(),
        None => vec![DEFAULT_REVALIDATE_PATH.to_string()],
    };
    if let Some(path) = paths.iter().find(|path| !path.starts_with('/')) {
        return Err(LoadError::invalid(
            "revalidate.paths",
            format!("`{path}` must start with `/`"),
        ));
    }

    Ok(RevalidateSettings { url, token, paths })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAppSettings {
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    url: Option<String>,
    token: Option<String>,
    seed_development_data: Option<bool>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWeatherSettings {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    url: Option<String>,
    count: Option<u32>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMusicSettings {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlurbSettings {
    api_key: Option<String>,
    api_base_url: Option<String>,
    model: Option<String>,
    timeout_ms: Option<u64>,
    prompt_url: Option<String>,
    owner_name: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProfileSettings {
    ttl_seconds: Option<u64>,
    provider_timeout_ms: Option<u64>,
    dev_cache_seconds: Option<u64>,
    response_cache_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCronSettings {
    secret: Option<String>,
    enabled: Option<bool>,
    schedule: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidateSettings {
    url: Option<String>,
    token: Option<String>,
    paths: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn optional_url(value: Option<String>, key: &'static str) -> Result<Option<Url>, LoadError> {
    non_empty(value)
        .map(|value| {
            Url::parse(&value).map_err(|err| LoadError::invalid(key, format!("`{value}`: {err}")))
        })
        .transpose()
}

fn url_or_default(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<Url, LoadError> {
    let value = non_empty(value).unwrap_or_else(|| default.to_string());
    Url::parse(&value).map_err(|err| LoadError::invalid(key, format!("`{value}`: {err}")))
}

fn millis(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        ms => Ok(Duration::from_millis(ms)),
    }
}

fn seconds(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
