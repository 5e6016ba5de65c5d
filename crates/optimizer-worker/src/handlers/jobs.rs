//! Job trigger handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use optimizer::{BatchResult, JobPayload};
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run an optimization job and return its batch result.
pub async fn trigger_optimization(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JobPayload>, JsonRejection>,
) -> ApiResult<Json<BatchResult>> {
    let Json(payload) = payload?;

    if matches!(payload.lookback_hours, Some(hours) if hours <= 0) {
        return Err(ApiError::BadRequest(
            "lookbackHours must be positive".to_string(),
        ));
    }

    info!(
        reason = %payload.reason,
        campaign_id = ?payload.campaign_id,
        dry_run = payload.dry_run,
        "Optimization job requested"
    );

    let result = state.runner.execute(&payload).await?;
    Ok(Json(result))
}
