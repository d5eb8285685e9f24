use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use irrigo_core::ActivityEntry;
use irrigo_engine::activity::ActivityLog;
use serde::{Deserialize, Serialize};

use super::{ApiState, ErrorResponse};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListActivityQuery {
    pub limit: Option<usize>,
}

/// Response body for one activity entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub id: String,
    pub timestamp: String,
    pub action: String,
    pub duration_seconds: u32,
    pub reason: String,
    pub moisture_level: f64,
    pub weather_condition: Option<String>,
}

impl From<ActivityEntry> for ActivityResponse {
    fn from(e: ActivityEntry) -> Self {
        Self {
            id: e.id.to_string(),
            timestamp: e.timestamp.to_string(),
            action: e.action.as_str().to_string(),
            duration_seconds: e.duration_seconds,
            reason: e.reason.to_string(),
            moisture_level: e.moisture_level_at_event,
            weather_condition: e.weather_condition_at_event.map(|c| c.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListActivityResponse {
    pub entries: Vec<ActivityResponse>,
    pub total: usize,
}

/// Most recent activity, newest first.
///
/// GET /api/activity?limit=..
pub async fn list_activity<L: ActivityLog>(
    State(state): State<ApiState<L>>,
    Query(query): Query<ListActivityQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let entries = match state.engine.recent_activity(limit).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to list activity");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to list activity")),
            )
                .into_response();
        }
    };

    match state.engine.log().count().await {
        Ok(total) => {
            let response = ListActivityResponse {
                entries: entries.into_iter().map(ActivityResponse::from).collect(),
                total,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to count activity");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to list activity")),
            )
                .into_response()
        }
    }
}
