// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthenticatedCaller;
use shared_models::error::AppError;
use shared_utils::extractor::{require_doctor, require_patient};

use crate::models::{AppointmentError, AvailableSlotsQuery, BookAppointmentRequest, ErrorKind};
use crate::services::{
    AppointmentBookingService, AppointmentHistoryService, AppointmentLifecycleService, AvailabilityService,
};

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::DependencyFailure => AppError::ExternalService(message),
            ErrorKind::Storage => AppError::Database(message),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// GET /appointments/slots?doctor_id=...&date=YYYY-MM-DD
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = non_blank(query.doctor_id)
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|_| AppError::ValidationError(format!("Invalid doctor_id: '{}'", raw)))
        })
        .transpose()?;
    let day = non_blank(query.date)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| AppError::ValidationError(format!("Invalid date: '{}'. Expected YYYY-MM-DD", raw)))
        })
        .transpose()?;

    let service = AvailabilityService::new(&state)?;
    let slots = service.available_slots(doctor_id, day, Utc::now()).await?;

    Ok(Json(json!(slots)))
}

// ==============================================================================
// BOOKING
// ==============================================================================

/// POST /appointments
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(caller): Extension<AuthenticatedCaller>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = require_patient(&caller)?;
    let Json(request) =
        payload.map_err(|rejection| AppError::ValidationError(format!("Invalid request body: {}", rejection.body_text())))?;

    let service = AppointmentBookingService::new(&state)?;
    let appointment = service.book(patient_id, request, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

/// GET /appointments/upcoming
#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(caller): Extension<AuthenticatedCaller>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&caller)?;
    let appointments = AppointmentHistoryService::new(&state)
        .upcoming_for_patient(patient_id)
        .await?;
    Ok(Json(json!(appointments)))
}

/// GET /appointments/past
#[axum::debug_handler]
pub async fn get_past_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(caller): Extension<AuthenticatedCaller>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&caller)?;
    let appointments = AppointmentHistoryService::new(&state)
        .past_for_patient(patient_id)
        .await?;
    Ok(Json(json!(appointments)))
}

/// GET /appointments/doctor
#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(caller): Extension<AuthenticatedCaller>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = require_doctor(&caller)?;
    let appointments = AppointmentHistoryService::new(&state)
        .upcoming_for_doctor(doctor_id)
        .await?;
    Ok(Json(json!(appointments)))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

/// PUT /appointments/complete/{appointment_id}
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(caller): Extension<AuthenticatedCaller>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&caller)?;
    let appointment = AppointmentLifecycleService::new(&state)
        .complete(appointment_id, patient_id, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// PUT /appointments/cancel/{appointment_id}
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(caller): Extension<AuthenticatedCaller>,
) -> Result<Json<Value>, AppError> {
    let patient_id = require_patient(&caller)?;
    let appointment = AppointmentLifecycleService::new(&state)
        .cancel(appointment_id, patient_id, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
