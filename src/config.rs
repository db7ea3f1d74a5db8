use crate::cache::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenWeather,
    Mock,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_forecast_path: String,
    pub weather_provider: ProviderKind,
    pub cities_file: String,
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub dashboard_city_limit: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openweather_api_key: None,
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            openweather_current_path: "/data/2.5/weather".to_string(),
            openweather_forecast_path: "/data/2.5/forecast".to_string(),
            weather_provider: ProviderKind::OpenWeather,
            cities_file: "cities.json".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5001,
            cache_ttl: DEFAULT_TTL,
            cache_sweep_interval: DEFAULT_SWEEP_INTERVAL,
            dashboard_city_limit: 8,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let weather_provider = match env::var("WEATHER_PROVIDER").as_deref() {
            Ok("mock") => ProviderKind::Mock,
            Ok("openweather") | Err(_) => ProviderKind::OpenWeather,
            Ok(other) => anyhow::bail!("Unknown WEATHER_PROVIDER: {}", other),
        };

        Ok(Config {
            openweather_api_key: env::var("OPENWEATHER_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            openweather_base_url: env::var("OPENWEATHER_BASE_URL")
                .unwrap_or(defaults.openweather_base_url),
            openweather_current_path: env::var("OPENWEATHER_CURRENT_PATH")
                .unwrap_or(defaults.openweather_current_path),
            openweather_forecast_path: env::var("OPENWEATHER_FORECAST_PATH")
                .unwrap_or(defaults.openweather_forecast_path),
            weather_provider,
            cities_file: env::var("CITIES_FILE").unwrap_or(defaults.cities_file),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            cache_ttl: Duration::from_secs(parse_var("CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?),
            cache_sweep_interval: sweep_interval(parse_var(
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval.as_secs(),
            )?)?,
            dashboard_city_limit: parse_var("DASHBOARD_CITY_LIMIT", defaults.dashboard_city_limit)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| split_origins(&origins))
                .unwrap_or(defaults.allowed_origins),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn sweep_interval(secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        anyhow::bail!("CACHE_SWEEP_INTERVAL_SECS must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
