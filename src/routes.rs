use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    cache::{city_params, CacheSnapshot, Params, ResponseCache},
    cities::{load_cities, City},
    config::Config,
    weather::{
        types::{CityWeather, ForecastEntry},
        WeatherError, WeatherProvider,
    },
};

pub const DASHBOARD_ENDPOINT: &str = "dashboard";
pub const CURRENT_WEATHER_ENDPOINT: &str = "current-weather";
pub const FORECAST_ENDPOINT: &str = "forecast";

/// Payloads held by the backend response cache.
#[derive(Debug, Clone)]
pub enum CachedWeather {
    Dashboard(Vec<CityWeather>),
    Current(CityWeather),
    Forecast(Vec<ForecastEntry>),
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub weather: Arc<dyn WeatherProvider>,
    pub cache: ResponseCache<CachedWeather>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Weather API key not configured")]
    NotConfigured,
    #[error("City not found. Please check the city name and try again.")]
    CityNotFound,
    #[error("Invalid API key configuration")]
    InvalidApiKey,
    #[error("Failed to fetch weather data. Please try again later.")]
    Upstream,
    #[error("City not found for forecast. Please check the city name and try again.")]
    ForecastCityNotFound,
    #[error("Failed to fetch forecast data. Please try again later.")]
    ForecastUpstream,
    #[error("Failed to load city codes")]
    CitiesUnavailable,
    #[error("City name is required")]
    MissingCity,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::CityNotFound | ApiError::ForecastCityNotFound => StatusCode::NOT_FOUND,
            ApiError::MissingCity => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured
            | ApiError::InvalidApiKey
            | ApiError::Upstream
            | ApiError::ForecastUpstream
            | ApiError::CitiesUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Forecast lookups report their own not-found and upstream messages.
    fn from_forecast(error: WeatherError) -> Self {
        match ApiError::from(error) {
            ApiError::CityNotFound => ApiError::ForecastCityNotFound,
            ApiError::Upstream => ApiError::ForecastUpstream,
            other => other,
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(error: WeatherError) -> Self {
        match error {
            WeatherError::NotFound(_) => ApiError::CityNotFound,
            WeatherError::Unauthorized => ApiError::InvalidApiKey,
            WeatherError::NotConfigured => ApiError::NotConfigured,
            _ => ApiError::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

// Request/Response types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub dashboard: Vec<CityWeather>,
    pub cached: bool,
    pub total_cities: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityInfo {
    pub id: String,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitiesResponse {
    pub cities: Vec<CityInfo>,
    pub total: usize,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub weather: CityWeather,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

// Route handlers
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Weather API Server is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    if !state.weather.is_configured() {
        return Err(ApiError::NotConfigured);
    }

    let cities = load_city_list(&state).await?;

    if let Some(CachedWeather::Dashboard(cached)) =
        state.cache.read(DASHBOARD_ENDPOINT, &Params::new())
    {
        tracing::debug!("Serving weather dashboard from cache");
        return Ok(Json(DashboardResponse {
            total_cities: cached.len(),
            dashboard: cached,
            cached: true,
            timestamp: chrono::Utc::now(),
            mode: "dashboard".to_string(),
            failed: None,
        }));
    }

    tracing::info!("Fetching fresh weather data for dashboard");
    let requested = cities.iter().take(state.config.dashboard_city_limit);
    let results = join_all(requested.map(|city| fetch_city(state.weather.as_ref(), city))).await;

    let attempted = results.len();
    let successful: Vec<CityWeather> = results.into_iter().flatten().collect();
    let failed = attempted - successful.len();

    // A dashboard with nothing in it is not worth serving for five minutes.
    if !successful.is_empty() {
        state.cache.write(
            DASHBOARD_ENDPOINT,
            &Params::new(),
            CachedWeather::Dashboard(successful.clone()),
        );
        tracing::info!(
            "Dashboard weather data cached ({}/{} cities successful)",
            successful.len(),
            attempted
        );
    } else if attempted > 0 {
        tracing::error!("Dashboard fetch failed for all {} cities", attempted);
    }

    Ok(Json(DashboardResponse {
        total_cities: successful.len(),
        dashboard: successful,
        cached: false,
        timestamp: chrono::Utc::now(),
        mode: "dashboard".to_string(),
        failed: Some(failed),
    }))
}

async fn fetch_city(weather: &dyn WeatherProvider, city: &City) -> Option<CityWeather> {
    match weather.current_weather(&city.name).await {
        Ok(current) => {
            let mut formatted = CityWeather::from(&current);
            formatted.id = Some(city.code.clone());
            Some(formatted)
        }
        Err(e) => {
            tracing::error!("Failed to fetch weather for {}: {}", city.name, e);
            None
        }
    }
}

async fn load_city_list(state: &AppState) -> Result<Vec<City>, ApiError> {
    match load_cities(&state.config.cities_file).await {
        Ok(cities) if !cities.is_empty() => Ok(cities),
        Ok(_) => {
            tracing::error!("Cities file {} is empty", state.config.cities_file);
            Err(ApiError::CitiesUnavailable)
        }
        Err(e) => {
            tracing::error!("Error loading {}: {}", state.config.cities_file, e);
            Err(ApiError::CitiesUnavailable)
        }
    }
}

pub async fn refresh_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    state.cache.invalidate_all();
    tracing::info!("Dashboard cache cleared, fetching fresh data");
    dashboard(State(state)).await
}

pub async fn list_cities(State(state): State<AppState>) -> Result<Json<CitiesResponse>, ApiError> {
    let cities = load_cities(&state.config.cities_file).await.map_err(|e| {
        tracing::error!("Error loading cities: {}", e);
        ApiError::CitiesUnavailable
    })?;

    let cities: Vec<CityInfo> = cities
        .into_iter()
        .map(|city| CityInfo {
            id: city.code,
            name: city.name,
            country: city.country_code.unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect();

    Ok(Json(CitiesResponse {
        total: cities.len(),
        cities,
        mode: "dashboard".to_string(),
    }))
}

/// Read-through lookup of a city's current weather. The flag reports a cache hit.
async fn current_weather_cached(
    state: &AppState,
    city: &str,
) -> Result<(CityWeather, bool), ApiError> {
    if !state.weather.is_configured() {
        return Err(ApiError::NotConfigured);
    }

    let params = city_params(city);
    if let Some(CachedWeather::Current(cached)) =
        state.cache.read(CURRENT_WEATHER_ENDPOINT, &params)
    {
        tracing::debug!("Serving current weather for {} from cache", city);
        return Ok((cached, true));
    }

    let current = state.weather.current_weather(city).await.map_err(|e| {
        tracing::error!("Weather API error for {}: {}", city, e);
        ApiError::from(e)
    })?;

    let formatted = CityWeather::from(&current);
    state.cache.write(
        CURRENT_WEATHER_ENDPOINT,
        &params,
        CachedWeather::Current(formatted.clone()),
    );
    tracing::info!("Current weather for {} cached", city);
    Ok((formatted, false))
}

pub async fn current_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<CityWeather>, ApiError> {
    let (weather, _) = current_weather_cached(&state, &city).await?;
    Ok(Json(weather))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let city = query
        .city
        .filter(|city| !city.trim().is_empty())
        .ok_or(ApiError::MissingCity)?;

    let (weather, cached) = current_weather_cached(&state, city.trim()).await?;
    Ok(Json(SearchResponse { weather, cached }))
}

pub async fn forecast(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<Vec<ForecastEntry>>, ApiError> {
    if !state.weather.is_configured() {
        return Err(ApiError::NotConfigured);
    }

    let params = city_params(&city);
    if let Some(CachedWeather::Forecast(cached)) = state.cache.read(FORECAST_ENDPOINT, &params) {
        tracing::debug!("Serving forecast for {} from cache", city);
        return Ok(Json(cached));
    }

    let response = state.weather.forecast(&city).await.map_err(|e| {
        tracing::error!("Forecast API error for {}: {}", city, e);
        ApiError::from_forecast(e)
    })?;

    let entries: Vec<ForecastEntry> = response.list.iter().map(ForecastEntry::from).collect();
    state.cache.write(
        FORECAST_ENDPOINT,
        &params,
        CachedWeather::Forecast(entries.clone()),
    );
    tracing::info!("Forecast for {} cached", city);
    Ok(Json(entries))
}

pub async fn cache_snapshot(State(state): State<AppState>) -> Json<CacheSnapshot> {
    Json(state.cache.snapshot())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.invalidate_all();
    Json(ClearResponse {
        success: true,
        message: "Backend cache cleared successfully".to_string(),
        timestamp: chrono::Utc::now(),
    })
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    let weather = Router::new()
        .route("/dashboard", get(dashboard))
        .route("/dashboard/refresh", post(refresh_dashboard))
        .route("/cities", get(list_cities))
        .route("/current/:city", get(current_weather))
        .route("/search", get(search))
        .route("/forecast/:city", get(forecast))
        .route("/cache", get(cache_snapshot).delete(clear_cache));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/weather", weather)
        .fallback(not_found)
        .with_state(state)
}
