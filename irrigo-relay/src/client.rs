use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::ErrorResponse;
use crate::api::activity::ListActivityResponse;
use crate::api::control::{ListRegionsResponse, RecommendationResponse, StatusResponse};
use crate::api::pump::{StartPumpRequest, StartPumpResponse, StopPumpResponse};
use crate::api::weather::WeatherResponse;

/// Error type for API client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The pump refused the command in its current state.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// HTTP client for the irrigo relay and control API.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    base_url: String,
}

impl Client {
    /// # Example
    /// ```no_run
    /// use irrigo_relay::client::Client;
    ///
    /// let client = Client::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(HttpClient::new(), base_url)
    }

    /// Use a preconfigured reqwest client, e.g. with timeouts.
    pub fn with_http_client(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(response.text().await?)
    }

    pub async fn weather(&self, region: &str) -> Result<WeatherResponse, ClientError> {
        let url = format!("{}/weather/{}", self.base_url, region);
        let response = self.http.get(&url).send().await?;
        handle_response(response).await
    }

    pub async fn all_weather(&self) -> Result<Vec<WeatherResponse>, ClientError> {
        let url = format!("{}/weather", self.base_url);
        let response = self.http.get(&url).send().await?;
        handle_response(response).await
    }

    pub async fn regions(&self) -> Result<ListRegionsResponse, ClientError> {
        let url = format!("{}/api/regions", self.base_url);
        let response = self.http.get(&url).send().await?;
        handle_response(response).await
    }

    /// Recommendation for a region and soil; `None` uses the configured field.
    pub async fn recommendation(
        &self,
        region: Option<&str>,
        soil: Option<&str>,
    ) -> Result<RecommendationResponse, ClientError> {
        let url = format!("{}/api/recommendation", self.base_url);

        let mut params = Vec::new();
        if let Some(region) = region {
            params.push(("region", region));
        }
        if let Some(soil) = soil {
            params.push(("soil", soil));
        }

        let response = self.http.get(&url).query(&params).send().await?;
        handle_response(response).await
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let url = format!("{}/api/status", self.base_url);
        let response = self.http.get(&url).send().await?;
        handle_response(response).await
    }

    /// Start the pump manually. Without a duration the server uses its
    /// current recommendation.
    pub async fn start_pump(&self, duration: Option<u32>) -> Result<StartPumpResponse, ClientError> {
        let url = format!("{}/api/pump/start", self.base_url);
        let request = StartPumpRequest { duration };
        let response = self.http.post(&url).json(&request).send().await?;
        handle_response(response).await
    }

    pub async fn stop_pump(&self) -> Result<StopPumpResponse, ClientError> {
        let url = format!("{}/api/pump/stop", self.base_url);
        let response = self.http.post(&url).send().await?;
        handle_response(response).await
    }

    pub async fn activity(&self, limit: Option<usize>) -> Result<ListActivityResponse, ClientError> {
        let url = format!("{}/api/activity", self.base_url);

        let mut request = self.http.get(&url);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await?;
        handle_response(response).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    if response.status().is_success() {
        return Ok(response.json().await?);
    }
    Err(error_from(response).await)
}

async fn error_from(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::BAD_REQUEST => ClientError::BadRequest(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        _ => ClientError::ServerError {
            status: status.as_u16(),
            message,
        },
    }
}
