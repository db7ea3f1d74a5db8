use serde::{Deserialize, Serialize};

// Raw OpenWeather payloads (`/data/2.5/weather` and `/data/2.5/forecast`).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub id: i64,
    pub name: String,
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
    pub visibility: Option<f64>,
    pub sys: CurrentSys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSys {
    pub country: Option<String>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub cnt: i32,
    pub list: Vec<ForecastItem>,
    pub city: ForecastCity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastItem {
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
    pub visibility: Option<f64>,
    pub pop: Option<f64>,
    pub dt_txt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastCity {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub timezone: Option<i32>,
}

// Shapes served to browsers.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityWeather {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub country: String,
    pub temperature: i64,
    pub description: String,
    pub icon: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub pressure: i64,
    pub temp_min: i64,
    pub temp_max: i64,
    pub feels_like: i64,
    pub visibility: Option<i64>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    pub datetime: String,
    pub temperature: i64,
    pub description: String,
    pub icon: String,
    pub humidity: i64,
    pub wind_speed: f64,
    pub pressure: i64,
    pub temp_min: i64,
    pub temp_max: i64,
}
