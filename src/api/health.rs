use axum::extract::State;
use axum::Json;

use crate::api::AppState;
use crate::error::AppError;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the meter database answers queries.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let meters = state.repo.count_meter_blocks().await?;
    Ok(Json(serde_json::json!({"status": "ready", "meters": meters})))
}
