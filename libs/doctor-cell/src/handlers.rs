use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DoctorError, DoctorProfile, Specialty};
use crate::services::{DoctorDirectory, SupabaseDoctorDirectory};

#[derive(Debug, Deserialize)]
pub struct SpecialtyQuery {
    pub specialty: Option<String>,
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::InvalidSpecialty(_) | DoctorError::InvalidWorkingHours(_) => {
                AppError::ValidationError(e.to_string())
            }
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// GET /doctors?specialty=Cardiology
#[axum::debug_handler]
pub async fn list_doctors_by_specialty(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SpecialtyQuery>,
) -> Result<Json<Value>, AppError> {
    let specialty: Specialty = query
        .specialty
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Please provide a specialty".to_string()))?
        .parse()?;

    debug!("Listing doctors for specialty {}", specialty);

    let directory = SupabaseDoctorDirectory::new(&state);
    let doctors: Vec<DoctorProfile> = directory
        .by_specialty(specialty)
        .await?
        .into_iter()
        .map(DoctorProfile::from)
        .collect();

    Ok(Json(json!(doctors)))
}
