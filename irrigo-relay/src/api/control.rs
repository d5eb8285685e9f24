use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use irrigo_core::{
    PumpStatus, Region, SensorReading, SoilType, TankState, Tier, WateringRecommendation,
    WeatherSnapshot,
};
use irrigo_engine::EngineStatus;
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::decision;
use serde::{Deserialize, Serialize};

use super::weather::{WeatherResponse, weather_error_response};
use super::{ApiState, ErrorResponse};

/// Response body for a soil type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub watering_multiplier: f64,
}

impl From<&SoilType> for SoilResponse {
    fn from(s: &SoilType) -> Self {
        Self {
            id: s.id.to_string(),
            name: s.name.to_string(),
            description: s.description.to_string(),
            watering_multiplier: s.watering_multiplier.into_inner(),
        }
    }
}

/// Response body for a region and its soil types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionResponse {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub soils: Vec<SoilResponse>,
}

impl RegionResponse {
    fn new(region: &Region, soils: &[SoilType]) -> Self {
        Self {
            id: region.id.to_string(),
            name: region.name.to_string(),
            lat: region.location.lat,
            lon: region.location.lon,
            soils: soils.iter().map(SoilResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListRegionsResponse {
    pub regions: Vec<RegionResponse>,
}

/// Query parameters for a recommendation. Missing values fall back to the
/// configured field.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecommendationQuery {
    pub region: Option<String>,
    pub soil: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub region: String,
    pub soil: String,
    pub watering_multiplier: f64,
    pub base_duration_seconds: u32,
    pub adjusted_duration_seconds: f64,
    pub tier: Tier,
    pub rationale: String,
    pub weather: WeatherResponse,
}

/// Engine snapshot as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub pump: PumpStatus,
    pub tank: TankState,
    pub reading: SensorReading,
    pub needs_watering: bool,
    pub moisture_threshold: u8,
    pub weather: Option<WeatherSnapshot>,
    pub recommendation: Option<WateringRecommendation>,
}

impl From<EngineStatus> for StatusResponse {
    fn from(s: EngineStatus) -> Self {
        Self {
            pump: s.pump,
            tank: s.tank,
            reading: s.reading,
            needs_watering: s.needs_watering,
            moisture_threshold: s.moisture_threshold,
            weather: s.weather,
            recommendation: s.recommendation,
        }
    }
}

/// List regions with their soil types.
///
/// GET /api/regions
pub async fn list_regions<L: ActivityLog>(State(state): State<ApiState<L>>) -> impl IntoResponse {
    let catalog = state.gateway.catalog();
    let regions = catalog
        .regions()
        .filter_map(|region| {
            let soils = catalog.soils(region.id.as_str()).ok()?;
            Some(RegionResponse::new(region, soils))
        })
        .collect();

    (StatusCode::OK, Json(ListRegionsResponse { regions }))
}

/// Watering recommendation for a region and soil type under current weather.
/// Without a region the profile's default region is used; without a soil,
/// the field's soil.
///
/// GET /api/recommendation?region=..&soil=..
pub async fn get_recommendation<L: ActivityLog>(
    State(state): State<ApiState<L>>,
    Query(query): Query<RecommendationQuery>,
) -> impl IntoResponse {
    let region = query
        .region
        .unwrap_or_else(|| state.engine.profile().default_region.to_string());
    let soil = query.soil.unwrap_or_else(|| state.field.soil.to_string());

    let soil_type = match state.gateway.catalog().soil(&region, &soil) {
        Ok(soil_type) => soil_type.clone(),
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                .into_response();
        }
    };

    let report = match state.gateway.fetch(&region).await {
        Ok(report) => report,
        Err(e) => return weather_error_response(e),
    };

    match decision::recommend(soil_type.watering_multiplier.into_inner(), &report.snapshot) {
        Ok(rec) => {
            let response = RecommendationResponse {
                region: report.snapshot.region.to_string(),
                soil: soil_type.id.to_string(),
                watering_multiplier: soil_type.watering_multiplier.into_inner(),
                base_duration_seconds: rec.base_duration_seconds,
                adjusted_duration_seconds: rec.adjusted_duration_seconds,
                tier: rec.tier,
                rationale: rec.rationale.to_string(),
                weather: WeatherResponse::from(report),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to compute recommendation");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Current pump, tank, soil and weather state.
///
/// GET /api/status
pub async fn get_status<L: ActivityLog>(State(state): State<ApiState<L>>) -> impl IntoResponse {
    let status = state.engine.status().await;
    (StatusCode::OK, Json(StatusResponse::from(status)))
}
