// libs/video-conferencing-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers::video_health_check;

/// Rooms are only created through booking; the cell itself exposes health only.
pub fn video_conferencing_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/health", get(video_health_check))
        .with_state(state)
}
