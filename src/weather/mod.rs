pub mod mock;
pub mod openweather;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;
use types::*;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("Rate limited, retry after: {0}s")]
    RateLimited(u64),
    #[error("City not found: {0}")]
    NotFound(String),
    #[error("Upstream rejected the API key")]
    Unauthorized,
    #[error("Weather API key not configured")]
    NotConfigured,
    #[error("API error: {0}")]
    ApiError(String),
}

/// Upstream source of weather data.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Whether calls can succeed at all, e.g. an API key is present.
    fn is_configured(&self) -> bool {
        true
    }

    async fn current_weather(&self, city: &str) -> Result<CurrentWeatherResponse, WeatherError>;

    async fn forecast(&self, city: &str) -> Result<ForecastResponse, WeatherError>;
}
