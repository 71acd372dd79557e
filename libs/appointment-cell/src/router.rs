// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/past", get(handlers::get_past_appointments))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/complete/{appointment_id}", put(handlers::complete_appointment))
        .route("/cancel/{appointment_id}", put(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
