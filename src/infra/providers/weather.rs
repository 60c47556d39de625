use std::sync::Arc;

use async_trait::async_trait;
use folio_api_types::Weather;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{
    cache::DevCaches,
    config::WeatherSettings,
    domain::{fallback, weather as rules},
    infra::kv::KvStore,
};

use super::{FallbackChain, ProviderError, ProviderKind, WeatherSource, endpoint, with_deadline};

const CURRENT_FIELDS: &str = "temperature_2m,weather_code";
const DAILY_FIELDS: &str =
    "temperature_2m_max,temperature_2m_min,relative_humidity_2m_mean,precipitation_probability_max";

/// Current conditions and today's forecast from Open-Meteo.
pub struct OpenMeteoClient {
    http: Client,
    settings: WeatherSettings,
    kv: Arc<dyn KvStore>,
    caches: Arc<DevCaches>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
    daily: DailyForecast,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    weather_code: i64,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    relative_humidity_2m_mean: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(
        http: Client,
        settings: WeatherSettings,
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

    pub fn forecast_url(&self) -> Url {
        let mut url = endpoint(&self.settings.base_url, "/v1/forecast");
        url.query_pairs_mut()
            .clear()
            .append_pair("latitude", &self.settings.latitude.to_string())
            .append_pair("longitude", &self.settings.longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("daily", DAILY_FIELDS)
            .append_pair("timezone", "auto")
            .append_pair("temperature_unit", "fahrenheit");
        url
    }

    fn cache_key(&self) -> String {
        format!(
            "weather-{}-{}",
            self.settings.latitude, self.settings.longitude
        )
    }

    /// The unprocessed vendor payload, bounded by the provider timeout.
    pub async fn fetch_raw(&self) -> Result<Value, ProviderError> {
        with_deadline(self.settings.timeout, async {
            let response = self
                .http
                .get(self.forecast_url())
                .send()
                .await
                .map_err(ProviderError::http)?;
            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    status: response.status().as_u16(),
                });
            }
            response.json::<Value>().await.map_err(ProviderError::decode)
        })
        .await
    }

    /// One upstream call, normalized, without any fallback.
    pub async fn fetch(&self) -> Result<Weather, ProviderError> {
        let raw = self.fetch_raw().await?;
        let forecast: ForecastResponse =
            serde_json::from_value(raw).map_err(ProviderError::decode)?;
        normalize(forecast, &self.settings.city)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn weather(&self) -> Weather {
        let cache_key = self.cache_key();
        FallbackChain {
            kind: ProviderKind::Weather,
            kv: self.kv.as_ref(),
            cache: &self.caches.weather,
            cache_key: &cache_key,
        }
        .resolve(
            self.fetch(),
            |profile| profile.weather,
            || fallback::default_weather(&self.settings.city),
        )
        .await
    }
}

fn first_value(values: &[Option<f64>], field: &'static str) -> Result<f64, ProviderError> {
    values
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| ProviderError::Decode(format!("daily.{field} has no value for today")))
}

fn normalize(forecast: ForecastResponse, city: &str) -> Result<Weather, ProviderError> {
    let daily = &forecast.daily;
    let temperature_high = first_value(&daily.temperature_2m_max, "temperature_2m_max")?;
    let temperature_low = first_value(&daily.temperature_2m_min, "temperature_2m_min")?;
    let humidity = first_value(
        &daily.relative_humidity_2m_mean,
        "relative_humidity_2m_mean",
    )?;
    let precipitation = first_value(
        &daily.precipitation_probability_max,
        "precipitation_probability_max",
    )?;

    let (mean_humidity, humidity_classification) = rules::classify_humidity(humidity);

    Ok(Weather {
        temperature: forecast.current.temperature_2m,
        temperature_high,
        temperature_low,
        condition: rules::condition_for_code(forecast.current.weather_code).to_string(),
        city: city.to_string(),
        mean_humidity,
        humidity_classification,
        precipitation_prob: rules::clamp_percent(precipitation),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use folio_api_types::HumidityBand;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::{
        cache::DevCacheConfig,
        infra::{kv::MemoryKv, providers::http_client},
    };

    use super::*;

    fn settings(base_url: &str) -> WeatherSettings {
        WeatherSettings {
            latitude: 33.749,
            longitude: -84.388,
            city: "Atlanta".to_string(),
            base_url: Url::parse(base_url).expect("base url"),
            timeout: Duration::from_millis(500),
        }
    }

    fn client(server: &MockServer, caches: DevCaches) -> OpenMeteoClient {
        OpenMeteoClient::new(
            http_client().expect("client"),
            settings(&server.base_url()),
            Arc::new(MemoryKv::new()),
            Arc::new(caches),
        )
    }

    fn forecast_body() -> Value {
        json!({
            "current": {"temperature_2m": 72.0, "weather_code": 2},
            "daily": {
                "temperature_2m_max": [80.1],
                "temperature_2m_min": [61.3],
                "relative_humidity_2m_mean": [55.4],
                "precipitation_probability_max": [40]
            }
        })
    }

    #[tokio::test]
    async fn normalizes_forecast() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/v1/forecast")
                    .query_param("latitude", "33.749")
                    .query_param("longitude", "-84.388")
                    .query_param("temperature_unit", "fahrenheit");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let weather = client(&server, DevCaches::disabled()).weather().await;

        mock.assert_async().await;
        assert_eq!(weather.temperature, 72.0);
        assert_eq!(weather.temperature_high, 80.1);
        assert_eq!(weather.temperature_low, 61.3);
        assert_eq!(weather.condition, "Partly Cloudy");
        assert_eq!(weather.city, "Atlanta");
        assert_eq!(weather.mean_humidity, 55);
        assert_eq!(weather.humidity_classification, HumidityBand::SomewhatHumid);
        assert_eq!(weather.precipitation_prob, 40);
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_kept() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/open-meteo/v1/forecast");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let client = OpenMeteoClient::new(
            http_client().expect("client"),
            settings(&format!("{}/open-meteo/", server.base_url())),
            Arc::new(MemoryKv::new()),
            Arc::new(DevCaches::disabled()),
        );
        assert!(client.fetch().await.is_ok());
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn server_error_falls_back_to_default() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/v1/forecast");
                then.status(500);
            })
            .await;

        let weather = client(&server, DevCaches::disabled()).weather().await;
        assert_eq!(weather, fallback::default_weather("Atlanta"));
    }

    #[tokio::test]
    async fn slow_upstream_times_out_into_default() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/v1/forecast");
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(forecast_body());
            })
            .await;

        let weather = client(&server, DevCaches::disabled()).weather().await;
        assert_eq!(weather.condition, "Unknown");
    }

    #[tokio::test]
    async fn development_cache_short_circuits_second_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/v1/forecast");
                then.status(200).json_body(forecast_body());
            })
            .await;

        let caches = DevCaches::new(&DevCacheConfig::enabled(Duration::from_secs(900)));
        let client = client(&server, caches);
        let first = client.weather().await;
        let second = client.weather().await;

        mock.assert_calls_async(1).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_daily_values_are_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/v1/forecast");
                then.status(200).json_body(json!({
                    "current": {"temperature_2m": 72.0, "weather_code": 0},
                    "daily": {
                        "temperature_2m_max": [],
                        "temperature_2m_min": [],
                        "relative_humidity_2m_mean": [],
                        "precipitation_probability_max": []
                    }
                }));
            })
            .await;

        let err = client(&server, DevCaches::disabled())
            .fetch()
            .await
            .expect_err("empty daily arrays");
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
