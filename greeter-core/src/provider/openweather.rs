use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    http::{client, fetch_json, unix_to_utc},
    model::CurrentWeather,
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: client(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, location: &str) -> Result<CurrentWeather> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        tracing::debug!(location, "Requesting current weather from OpenWeather");

        let request = self.http.get(url).query(&[
            ("q", location),
            ("appid", self.api_key.as_str()),
            ("units", "metric"),
        ]);
        let parsed: OwCurrentResponse = fetch_json(request, "OpenWeather current").await?;

        let observation_time = unix_to_utc(parsed.dt).unwrap_or_else(Utc::now);

        let condition = parsed
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(CurrentWeather {
            provider: "openweather".to_string(),
            location_name: parsed.name,
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like,
            condition,
            humidity_pct: parsed.main.humidity,
            wind_speed_mps: parsed.wind.speed,
            observation_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn current_weather_requests_metric_units() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Berlin"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Berlin",
                "dt": 1700000000,
                "main": {"temp": 4.25, "feels_like": 1.0, "humidity": 88},
                "weather": [{"description": "light rain"}],
                "wind": {"speed": 3.6}
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), &mock_server.uri());
        let weather = provider.current_weather("Berlin").await.unwrap();

        assert_eq!(weather.provider, "openweather");
        assert_eq!(weather.location_name, "Berlin");
        assert_eq!(weather.temperature_c, 4.25);
        assert_eq!(weather.condition, "light rain");
        assert_eq!(weather.humidity_pct, 88);
    }

    #[tokio::test]
    async fn missing_condition_falls_back_to_unknown() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Oslo",
                "dt": 1700000000,
                "main": {"temp": -3.0, "feels_like": -7.5, "humidity": 70},
                "weather": [],
                "wind": {"speed": 1.2}
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), &mock_server.uri());
        let weather = provider.current_weather("Oslo").await.unwrap();

        assert_eq!(weather.condition, "Unknown");
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let provider = OpenWeatherProvider::with_base_url("KEY".into(), &mock_server.uri());
        let err = provider.current_weather("Oslo").await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse OpenWeather current JSON"));
    }
}
