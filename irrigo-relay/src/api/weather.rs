use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::weather::{Provenance, WeatherError, WeatherReport};
use serde::{Deserialize, Serialize};

use super::{ApiState, ErrorResponse};

const FETCH_FAILED: &str = "Failed to fetch weather data";

/// Response body for one region's weather.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub region: String,
    pub city: String,
    pub temperature: f64,
    pub humidity: f64,
    pub condition: String,
    pub rain_forecast: bool,
    pub description: String,
    pub fetched_at: String,
    pub provenance: Provenance,
}

impl From<WeatherReport> for WeatherResponse {
    fn from(report: WeatherReport) -> Self {
        let s = report.snapshot;
        Self {
            region: s.region.to_string(),
            city: s.city.to_string(),
            temperature: s.temperature,
            humidity: s.humidity,
            condition: s.condition.to_string(),
            rain_forecast: s.rain_forecast,
            description: s.description.to_string(),
            fetched_at: s.fetched_at.to_string(),
            provenance: report.provenance,
        }
    }
}

pub(crate) fn weather_error_response(e: WeatherError) -> axum::response::Response {
    match e {
        WeatherError::UnknownRegion(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
        }
        e => {
            tracing::error!(error = ?e, "Failed to fetch weather");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(FETCH_FAILED)),
            )
                .into_response()
        }
    }
}

/// Current weather for one region.
///
/// GET /weather/{region}
pub async fn get_weather<L: ActivityLog>(
    State(state): State<ApiState<L>>,
    Path(region): Path<String>,
) -> impl IntoResponse {
    match state.gateway.fetch(&region).await {
        Ok(report) => (StatusCode::OK, Json(WeatherResponse::from(report))).into_response(),
        Err(e) => weather_error_response(e),
    }
}

/// Current weather for every configured region.
///
/// GET /weather
pub async fn list_weather<L: ActivityLog>(State(state): State<ApiState<L>>) -> impl IntoResponse {
    match state.gateway.fetch_all().await {
        Ok(reports) => {
            let body: Vec<WeatherResponse> =
                reports.into_iter().map(WeatherResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => weather_error_response(e),
    }
}
