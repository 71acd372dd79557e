// libs/appointment-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorDirectory, SupabaseDoctorDirectory};
use shared_config::{AppConfig, SchedulingConfig};

use crate::models::AppointmentError;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::time_grid::TimeGrid;

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    grid: TimeGrid,
    scheduling: SchedulingConfig,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        Self::with_components(
            Arc::new(SupabaseDoctorDirectory::new(config)),
            Arc::new(SupabaseAppointmentStore::new(config)),
            config.scheduling.clone(),
        )
    }

    pub fn with_components(
        doctors: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        scheduling: SchedulingConfig,
    ) -> Result<Self, AppointmentError> {
        let grid = TimeGrid::from_config(&scheduling)?;
        Ok(Self {
            doctors,
            store,
            grid,
            scheduling,
        })
    }

    /// Free slot instants for a doctor on `day`, ascending.
    ///
    /// A slot is free when no `upcoming` appointment (or live reservation)
    /// holds it. When `day` is today in the schedule clock, slots at or
    /// before `now` are dropped as well.
    pub async fn available_slots(
        &self,
        doctor_id: Option<Uuid>,
        day: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        let doctor_id = doctor_id.ok_or(AppointmentError::MissingParameter("doctor_id"))?;
        let day = day.ok_or(AppointmentError::MissingParameter("date"))?;

        debug!("Resolving available slots for doctor {} on {}", doctor_id, day);

        let doctor = load_doctor(self.doctors.as_ref(), doctor_id).await?;
        let candidates = self.grid.slots_for(&doctor.working_hours, day)?;

        let (from, to) = self.grid.day_bounds(day)?;
        let booked: HashSet<DateTime<Utc>> = self
            .store
            .booked_instants(doctor_id, from, to, self.scheduling.stale_reservation_cutoff(now))
            .await
            .map_err(|e| {
                error!("Failed to load booked slots for doctor {}: {}", doctor_id, e);
                AppointmentError::from(e)
            })?
            .into_iter()
            .collect();

        let total = candidates.len();
        let slots = filter_available(candidates, &booked, self.grid.is_today(day, now), now);
        debug!("{} of {} slots free for doctor {} on {}", slots.len(), total, doctor_id, day);

        Ok(slots)
    }
}

/// Fetches a doctor, turning absence into [`AppointmentError::DoctorNotFound`].
pub(crate) async fn load_doctor(
    doctors: &dyn DoctorDirectory,
    doctor_id: Uuid,
) -> Result<Doctor, AppointmentError> {
    doctors
        .get(doctor_id)
        .await?
        .ok_or(AppointmentError::DoctorNotFound)
}

pub fn filter_available(
    candidates: Vec<DateTime<Utc>>,
    booked: &HashSet<DateTime<Utc>>,
    is_today: bool,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    candidates
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .filter(|slot| !is_today || *slot > now)
        .collect()
}
