// libs/appointment-cell/src/services/history.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

/// Read-side listings for patients and doctors. Pending reservations never
/// show up here.
pub struct AppointmentHistoryService {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(Arc::new(SupabaseAppointmentStore::new(config)))
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn upcoming_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing upcoming appointments for patient {}", patient_id);
        Ok(self.store.list_for_patient(patient_id, AppointmentStatus::Upcoming).await?)
    }

    /// Completed appointments, most recent first.
    pub async fn past_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing past appointments for patient {}", patient_id);
        let mut appointments = self
            .store
            .list_for_patient(patient_id, AppointmentStatus::Completed)
            .await?;
        appointments.reverse();
        Ok(appointments)
    }

    pub async fn upcoming_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing upcoming appointments for doctor {}", doctor_id);
        Ok(self.store.list_for_doctor(doctor_id, AppointmentStatus::Upcoming).await?)
    }
}
