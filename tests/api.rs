use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use weather_proxy_server::{
    cache::{ManualClock, ResponseCache},
    client::{ClientError, WeatherServiceClient},
    config::Config,
    routes::{create_router, AppState, CachedWeather},
    weather::{mock::MockWeatherProvider, openweather::OpenWeatherClient, WeatherProvider},
};

struct TestApp {
    base_url: String,
    http: reqwest::Client,
    provider: Arc<MockWeatherProvider>,
    cache: ResponseCache<CachedWeather>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

fn test_config() -> Config {
    Config {
        cities_file: concat!(env!("CARGO_MANIFEST_DIR"), "/cities.json").to_string(),
        ..Config::default()
    }
}

async fn serve(weather: Arc<dyn WeatherProvider>, cache: ResponseCache<CachedWeather>) -> String {
    let state = AppState {
        config: Arc::new(test_config()),
        weather,
        cache,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    format!("http://{}/api", address)
}

async fn spawn_app(provider: MockWeatherProvider) -> TestApp {
    let provider = Arc::new(provider);
    let clock = Arc::new(ManualClock::default());
    let cache = ResponseCache::with_clock("backend", Duration::from_secs(300), clock.clone());
    let base_url = serve(provider.clone(), cache.clone()).await;

    TestApp {
        base_url,
        http: reqwest::Client::new(),
        provider,
        cache,
        clock,
    }
}

#[tokio::test]
async fn health_check() {
    let app = spawn_app(MockWeatherProvider::new()).await;
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn current_weather_is_served_from_cache() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, first) = app.get("/weather/current/Paris").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["name"], "Paris");
    assert_eq!(first["country"], "FR");

    app.clock.advance(Duration::from_secs(100));
    let (_, second) = app.get("/weather/current/paris").await;
    assert_eq!(second, first);
    assert_eq!(app.provider.calls(), 1);

    let (status, search) = app.get("/weather/search?city=PARIS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(search["cached"], true);
    assert_eq!(search["temperature"], first["temperature"]);
    assert_eq!(app.provider.calls(), 1);
}

#[tokio::test]
async fn expired_entries_are_fetched_again() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    app.get("/weather/current/London").await;
    app.clock.advance(Duration::from_secs(300));
    app.get("/weather/current/London").await;
    assert_eq!(app.provider.calls(), 1);

    app.clock.advance(Duration::from_secs(1));
    let (status, _) = app.get("/weather/current/London").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.provider.calls(), 2);
}

#[tokio::test]
async fn unknown_city_is_not_cached() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, body) = app.get("/weather/current/Atlantis").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"],
        "City not found. Please check the city name and try again."
    );
    assert_eq!(app.cache.stats().total_entries, 0);
}

#[tokio::test]
async fn search_requires_a_city() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, body) = app.get("/weather/search?city=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "City name is required");

    let (status, _) = app.get("/weather/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_outage_keeps_cached_values() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (_, before) = app.get("/weather/current/Tokyo").await;
    app.provider.set_unavailable(true);

    let (status, after) = app.get("/weather/current/Tokyo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after, before);

    let (status, body) = app.get("/weather/current/Oslo").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Failed to fetch weather data. Please try again later."
    );
    assert_eq!(app.cache.stats().total_entries, 1);
}

#[tokio::test]
async fn forecast_is_cached_per_city() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, forecast) = app.get("/weather/forecast/Sydney").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(forecast.as_array().map(Vec::len), Some(40));

    app.get("/weather/forecast/sydney").await;
    app.get("/weather/current/sydney").await;
    assert_eq!(app.provider.calls(), 2);
}

#[tokio::test]
async fn forecast_errors_use_forecast_messages() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, body) = app.get("/weather/forecast/Atlantis").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"],
        "City not found for forecast. Please check the city name and try again."
    );

    app.provider.set_unavailable(true);
    let (status, body) = app.get("/weather/forecast/Oslo").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Failed to fetch forecast data. Please try again later."
    );
    assert_eq!(app.cache.stats().total_entries, 0);
}

#[tokio::test]
async fn dashboard_caches_successful_cities() {
    // Oslo is in the first eight cities of the bundled file but unknown here.
    let app = spawn_app(MockWeatherProvider::with_cities([
        "Colombo",
        "Tokyo",
        "Liverpool",
        "Paris",
        "Sydney",
        "Boston",
        "Shanghai",
        "London",
    ]))
    .await;

    let (status, first) = app.get("/weather/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["totalCities"], 7);
    assert_eq!(first["failed"], 1);
    assert_eq!(first["mode"], "dashboard");
    assert_eq!(first["dashboard"][0]["id"], "1248991");
    assert_eq!(app.provider.calls(), 8);

    let (_, second) = app.get("/weather/dashboard").await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["totalCities"], 7);
    assert!(second.get("failed").is_none());
    assert_eq!(app.provider.calls(), 8);

    let (status, refreshed) = app.post("/weather/dashboard/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["cached"], false);
    assert_eq!(app.provider.calls(), 16);
}

#[tokio::test]
async fn dashboard_with_no_successes_is_not_cached() {
    let app = spawn_app(MockWeatherProvider::new()).await;
    app.provider.set_unavailable(true);

    let (status, body) = app.get("/weather/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCities"], 0);
    assert_eq!(body["failed"], 8);
    assert_eq!(app.cache.stats().total_entries, 0);
}

#[tokio::test]
async fn cities_are_listed() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, body) = app.get("/weather/cities").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 9);
    assert_eq!(body["cities"][0]["id"], "1248991");
    assert_eq!(body["cities"][0]["name"], "Colombo");
    assert_eq!(body["cities"][0]["country"], "LK");
}

#[tokio::test]
async fn cache_can_be_inspected_and_cleared() {
    let app = spawn_app(MockWeatherProvider::new()).await;
    app.get("/weather/current/Boston").await;
    app.clock.advance(Duration::from_secs(30));

    let (status, snapshot) = app.get("/weather/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["totalEntries"], 1);
    assert_eq!(snapshot["validEntries"], 1);
    assert_eq!(snapshot["ttlSeconds"], 300);
    assert_eq!(snapshot["entries"][0]["key"], r#"current-weather_{"city":"boston"}"#);
    assert_eq!(snapshot["entries"][0]["ageSeconds"], 30);
    assert_eq!(snapshot["entries"][0]["remainingSeconds"], 270);

    let response = app
        .http
        .delete(format!("{}/weather/cache", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared: Value = response.json().await.unwrap();
    assert_eq!(cleared["success"], true);

    let (_, snapshot) = app.get("/weather/cache").await;
    assert_eq!(snapshot["totalEntries"], 0);
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let app = spawn_app(MockWeatherProvider::new()).await;

    let (status, body) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn missing_api_key_is_reported() {
    let weather = Arc::new(OpenWeatherClient::new(Config::default()).unwrap());
    let base_url = serve(weather, ResponseCache::new("backend", Duration::from_secs(300))).await;

    let response = reqwest::get(format!("{}/weather/current/London", base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Weather API key not configured");
}

#[tokio::test]
async fn client_keeps_its_own_cache() {
    let app = spawn_app(MockWeatherProvider::new()).await;
    let client = WeatherServiceClient::new(app.base_url.clone()).unwrap();

    let first = client.fetch_dashboard().await.unwrap();
    assert!(!first.frontend_cached);
    assert!(!first.response.cached);
    assert_eq!(first.response.total_cities, 8);

    let second = client.fetch_dashboard().await.unwrap();
    assert!(second.frontend_cached);
    assert_eq!(app.provider.calls(), 8);
    assert_eq!(client.cache_info().total_entries, 1);

    // Clearing the server cache leaves the client cache untouched.
    app.cache.invalidate_all();
    assert!(client.fetch_dashboard().await.unwrap().frontend_cached);

    client.clear_cache();
    let third = client.fetch_dashboard().await.unwrap();
    assert!(!third.frontend_cached);
    assert_eq!(app.provider.calls(), 16);
}

#[tokio::test]
async fn client_search_reports_backend_cache() {
    let app = spawn_app(MockWeatherProvider::new()).await;
    let client = WeatherServiceClient::new(app.base_url.clone()).unwrap();

    let first = client.fetch_weather("Shanghai").await.unwrap();
    assert!(!first.backend_cached);
    assert_eq!(first.response.weather.name, "Shanghai");

    let second = client.fetch_weather("Shanghai").await.unwrap();
    assert!(second.backend_cached);
    assert!(!second.frontend_cached);

    let forecast = client.fetch_forecast("Liverpool").await.unwrap();
    assert_eq!(forecast.len(), 40);

    match client.fetch_forecast("Gotham City").await {
        Err(ClientError::NotFound(message)) => {
            assert_eq!(
                message,
                "City not found for forecast. Please check the city name and try again."
            )
        }
        other => panic!("expected NotFound, got {:?}", other.map(|f| f.len())),
    }
}
