use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::services::DailyRoomProvisioner;

pub async fn video_health_check(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    if !state.is_video_conferencing_configured() {
        return Ok(Json(json!({
            "status": "not_configured",
            "video_configured": false,
            "message": "Video conferencing not configured"
        })));
    }

    let provisioner = DailyRoomProvisioner::new(&state)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let provider_healthy = provisioner.health_check().await.unwrap_or(false);

    Ok(Json(json!({
        "status": if provider_healthy { "healthy" } else { "unhealthy" },
        "video_configured": true,
        "provider_status": if provider_healthy { "connected" } else { "error" },
    })))
}
