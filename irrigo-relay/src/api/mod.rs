pub mod activity;
pub mod control;
pub mod pump;
pub mod weather;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use irrigo_engine::Irrigation;
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::runtime::Field;
use irrigo_engine::weather::WeatherGateway;
use serde::{Deserialize, Serialize};

/// Shared state for API handlers.
pub struct ApiState<L> {
    pub engine: Irrigation<L>,
    pub gateway: Arc<WeatherGateway>,
    /// Soil used when a recommendation request does not name one.
    pub field: Field,
}

impl<L: ActivityLog> Clone for ApiState<L> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            gateway: Arc::clone(&self.gateway),
            field: self.field.clone(),
        }
    }
}

/// Error body shared by all endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Create the full router: health, weather relay and control API.
pub fn api_router<L: ActivityLog>(state: ApiState<L>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/weather", get(weather::list_weather::<L>))
        .route("/weather/{region}", get(weather::get_weather::<L>))
        .route("/api/regions", get(control::list_regions::<L>))
        .route("/api/recommendation", get(control::get_recommendation::<L>))
        .route("/api/status", get(control::get_status::<L>))
        .route("/api/pump/start", post(pump::start_pump::<L>))
        .route("/api/pump/stop", post(pump::stop_pump::<L>))
        .route("/api/activity", get(activity::list_activity::<L>))
        .with_state(state)
}

pub async fn health() -> &'static str {
    "OK"
}
