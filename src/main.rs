use axum::http::{header, HeaderValue, Method};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_proxy_server::{
    cache::ResponseCache,
    config::{Config, ProviderKind},
    routes::{create_router, AppState},
    weather::{mock::MockWeatherProvider, openweather::OpenWeatherClient, WeatherProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_proxy_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let weather: Arc<dyn WeatherProvider> = match config.weather_provider {
        ProviderKind::OpenWeather => {
            if config.openweather_api_key.is_none() {
                tracing::warn!("OPENWEATHER_API_KEY not set, weather routes will answer 500");
            }
            Arc::new(OpenWeatherClient::new(config.clone())?)
        }
        ProviderKind::Mock => {
            tracing::info!("Using mock weather provider");
            Arc::new(MockWeatherProvider::new())
        }
    };

    let cache = ResponseCache::new("backend", config.cache_ttl);
    let sweeper = cache.start_sweeper(config.cache_sweep_interval);

    let cors = cors_layer(&config.allowed_origins);
    let address = config.bind_address();

    let state = AppState {
        config: Arc::new(config),
        weather,
        cache,
    };

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server starting on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    tracing::info!("Server stopped");

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
