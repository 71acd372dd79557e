use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Doctor lookup is public; patients browse before booking.
    Router::new()
        .route("/", get(handlers::list_doctors_by_specialty))
        .with_state(state)
}
