use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use irrigo_core::PumpRun;
use irrigo_engine::IrrigationError;
use irrigo_engine::activity::ActivityLog;
use irrigo_engine::pump::StartOutcome;
use serde::{Deserialize, Serialize};

use super::activity::ActivityResponse;
use super::{ApiState, ErrorResponse};

/// Used when neither the request nor a recommendation gives a duration.
pub const DEFAULT_MANUAL_SECONDS: u32 = 10;

/// Request body for a manual start.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StartPumpRequest {
    /// Seconds to run. Defaults to the current recommendation.
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StartPumpResponse {
    Started { run: PumpRun },
    Skipped { reason: String, entry: ActivityResponse },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopPumpResponse {
    pub run: PumpRun,
    pub elapsed_seconds: u32,
    pub entry: ActivityResponse,
}

fn engine_error_response(e: IrrigationError, action: &str) -> axum::response::Response {
    match e {
        IrrigationError::Pump(e) => {
            (StatusCode::CONFLICT, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
        e => {
            tracing::error!(error = ?e, "Failed to {action}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("Failed to {action}"))),
            )
                .into_response()
        }
    }
}

/// Start the pump manually. The body is optional.
///
/// POST /api/pump/start
pub async fn start_pump<L: ActivityLog>(
    State(state): State<ApiState<L>>,
    body: Option<Json<StartPumpRequest>>,
) -> impl IntoResponse {
    let Json(request) = body.unwrap_or_default();
    let duration = match request.duration {
        Some(duration) => duration,
        None => state
            .engine
            .recommendation()
            .await
            .map(|rec| rec.countdown_seconds())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_MANUAL_SECONDS),
    };

    match state.engine.start_manual(duration).await {
        Ok(StartOutcome::Started(run)) => {
            (StatusCode::OK, Json(StartPumpResponse::Started { run })).into_response()
        }
        Ok(StartOutcome::Skipped { reason, record }) => (
            StatusCode::OK,
            Json(StartPumpResponse::Skipped {
                reason: reason.to_string(),
                entry: ActivityResponse::from(record),
            }),
        )
            .into_response(),
        Err(e) => engine_error_response(e, "start pump"),
    }
}

/// Stop the running pump.
///
/// POST /api/pump/stop
pub async fn stop_pump<L: ActivityLog>(State(state): State<ApiState<L>>) -> impl IntoResponse {
    match state.engine.stop_manual().await {
        Ok(stopped) => {
            let response = StopPumpResponse {
                run: stopped.run,
                elapsed_seconds: stopped.record.duration_seconds,
                entry: ActivityResponse::from(stopped.record),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => engine_error_response(e, "stop pump"),
    }
}
