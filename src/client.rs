//! Service layer for consumers of the weather API, with its own response
//! cache kept separate from the server's.

use crate::cache::{CacheSnapshot, Params, ResponseCache, DEFAULT_TTL};
use crate::routes::{ClearResponse, DashboardResponse, ErrorBody, SearchResponse};
use crate::weather::types::ForecastEntry;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const DASHBOARD_PATH: &str = "/weather/dashboard";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Server(String),
    #[error("Authentication failed. Please log in again.")]
    Unauthorized,
    #[error("API error occurred ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unable to connect to weather service. Please check your connection.")]
    Network(#[source] reqwest::Error),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    #[serde(flatten)]
    pub response: DashboardResponse,
    pub frontend_cached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    #[serde(flatten)]
    pub response: SearchResponse,
    pub frontend_cached: bool,
    pub backend_cached: bool,
}

pub struct WeatherServiceClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
    cache: ResponseCache<DashboardResponse>,
}

impl WeatherServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_cache(base_url, ResponseCache::new("frontend", DEFAULT_TTL))
    }

    pub fn with_cache(
        base_url: impl Into<String>,
        cache: ResponseCache<DashboardResponse>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            cache,
        })
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        if token.is_some() {
            tracing::debug!("Auth token set in weather service client");
        } else {
            tracing::debug!("Auth token removed from weather service client");
        }
        self.auth_token = token;
    }

    pub async fn fetch_dashboard(&self) -> Result<DashboardView, ClientError> {
        if let Some(response) = self.cache.read(DASHBOARD_PATH, &Params::new()) {
            tracing::debug!("Serving dashboard from frontend cache");
            return Ok(DashboardView {
                response,
                frontend_cached: true,
            });
        }

        let response: DashboardResponse = self.send(self.get(DASHBOARD_PATH)).await?;
        self.cache
            .write(DASHBOARD_PATH, &Params::new(), response.clone());
        tracing::info!("Dashboard loaded with {} cities", response.total_cities);

        Ok(DashboardView {
            response,
            frontend_cached: false,
        })
    }

    /// Always goes to the server so its cache is what answers repeat lookups.
    pub async fn fetch_weather(&self, city: &str) -> Result<SearchView, ClientError> {
        let request = self.get("/weather/search").query(&[("city", city)]);
        let response: SearchResponse = self.send(request).await?;
        tracing::debug!(
            "Backend response for {}: {}",
            city,
            if response.cached { "CACHED" } else { "FRESH" }
        );

        Ok(SearchView {
            backend_cached: response.cached,
            frontend_cached: false,
            response,
        })
    }

    pub async fn fetch_forecast(&self, city: &str) -> Result<Vec<ForecastEntry>, ClientError> {
        let path = format!("/weather/forecast/{}", urlencoding::encode(city));
        self.send(self.get(&path)).await
    }

    pub fn cache_info(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    pub fn clear_cache(&self) -> ClearResponse {
        self.cache.invalidate_all();
        ClearResponse {
            success: true,
            message: "Frontend cache cleared successfully".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ClientError::Network(e)
            } else {
                ClientError::Request(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .ok();
        tracing::error!("API error {}: {:?}", status, message);

        Err(match status {
            StatusCode::NOT_FOUND => {
                ClientError::NotFound(message.unwrap_or_else(|| "Not found.".to_string()))
            }
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::INTERNAL_SERVER_ERROR => ClientError::Server(
                message.unwrap_or_else(|| "Server error occurred.".to_string()),
            ),
            other => ClientError::Api {
                status: other.as_u16(),
                message: message.unwrap_or_default(),
            },
        })
    }
}
