use super::types::*;
use super::{WeatherError, WeatherProvider};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

const MAX_RETRIES: u32 = 3;

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent("WeatherProxyServer/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.config
            .openweather_api_key
            .as_deref()
            .ok_or(WeatherError::NotConfigured)
    }

    async fn make_request_with_retry(
        &self,
        path: &str,
        city: &str,
    ) -> Result<Value, WeatherError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.config.openweather_base_url, path);
        let params = [("q", city), ("units", "metric"), ("appid", api_key)];

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(1000);

        loop {
            let response = self.client.get(&url).query(&params).send().await?;

            match response.status() {
                reqwest::StatusCode::OK => {
                    let json: Value = response.json().await?;
                    return Ok(json);
                }
                reqwest::StatusCode::NOT_FOUND => {
                    return Err(WeatherError::NotFound(city.to_string()));
                }
                reqwest::StatusCode::UNAUTHORIZED => {
                    return Err(WeatherError::Unauthorized);
                }
                reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if retry_count >= MAX_RETRIES {
                        return Err(WeatherError::RateLimited(delay.as_secs()));
                    }

                    tracing::warn!(
                        "Rate limited by OpenWeather API, retrying in {}ms",
                        delay.as_millis()
                    );

                    sleep(delay).await;
                    delay = delay.mul_f32(2.0 + fastrand::f32() * 0.5); // Exponential backoff with jitter
                    retry_count += 1;
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(WeatherError::ApiError(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    fn is_configured(&self) -> bool {
        self.config.openweather_api_key.is_some()
    }

    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherResponse, WeatherError> {
        let response = self
            .make_request_with_retry(&self.config.openweather_current_path, city)
            .await?;

        let current: CurrentWeatherResponse = serde_json::from_value(response)?;
        Ok(current)
    }

    async fn forecast(&self, city: &str) -> Result<ForecastResponse, WeatherError> {
        let response = self
            .make_request_with_retry(&self.config.openweather_forecast_path, city)
            .await?;

        let forecast: ForecastResponse = serde_json::from_value(response)?;
        Ok(forecast)
    }
}

// Convert OpenWeather data to the served format
impl From<&CurrentWeatherResponse> for CityWeather {
    fn from(current: &CurrentWeatherResponse) -> Self {
        let condition = current.weather.first();

        Self {
            id: Some(current.id.to_string()),
            name: current.name.clone(),
            country: current.sys.country.clone().unwrap_or_default(),
            temperature: current.main.temp.round() as i64,
            description: condition.map(|c| c.description.clone()).unwrap_or_default(),
            icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
            humidity: current.main.humidity.round() as i64,
            wind_speed: round_one_decimal(current.wind.speed),
            pressure: current.main.pressure.round() as i64,
            temp_min: current.main.temp_min.round() as i64,
            temp_max: current.main.temp_max.round() as i64,
            feels_like: current.main.feels_like.round() as i64,
            visibility: visibility_km(current.visibility),
            // Stamped with the fetch time; a cached city keeps its original stamp.
            timestamp: chrono::Utc::now(),
        }
    }
}

impl From<&ForecastItem> for ForecastEntry {
    fn from(item: &ForecastItem) -> Self {
        let condition = item.weather.first();

        Self {
            datetime: item.dt_txt.clone(),
            temperature: item.main.temp.round() as i64,
            description: condition.map(|c| c.description.clone()).unwrap_or_default(),
            icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
            humidity: item.main.humidity.round() as i64,
            wind_speed: round_one_decimal(item.wind.speed),
            pressure: item.main.pressure.round() as i64,
            temp_min: item.main.temp_min.round() as i64,
            temp_max: item.main.temp_max.round() as i64,
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// Missing or zero visibility is reported as unknown.
fn visibility_km(meters: Option<f64>) -> Option<i64> {
    meters
        .filter(|m| *m > 0.0)
        .map(|m| (m / 1000.0).round() as i64)
}
