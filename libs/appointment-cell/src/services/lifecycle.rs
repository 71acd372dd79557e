// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

/// Validate that a status transition is allowed
pub fn validate_status_transition(
    current_status: AppointmentStatus,
    new_status: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if !valid_transitions(current_status).contains(&new_status) {
        warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
        return Err(AppointmentError::ValidationError(format!(
            "Cannot move an appointment from {} to {}",
            current_status, new_status
        )));
    }
    Ok(())
}

pub fn valid_transitions(current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current_status {
        AppointmentStatus::Upcoming => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        // Terminal states
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(Arc::new(SupabaseAppointmentStore::new(config)))
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Moves the caller's own `upcoming` appointment to a terminal status.
    ///
    /// Missing, foreign and already-terminal appointments all yield
    /// [`AppointmentError::NotFound`] so callers cannot discover records
    /// they do not own.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        validate_status_transition(AppointmentStatus::Upcoming, target)?;
        debug!("Transitioning appointment {} to {}", appointment_id, target);

        let updated = self
            .store
            .transition(appointment_id, patient_id, target, now)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} is now {}", updated.id, updated.status);
        Ok(updated)
    }

    pub async fn complete(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, patient_id, AppointmentStatus::Completed, now)
            .await
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, patient_id, AppointmentStatus::Cancelled, now)
            .await
    }
}
