// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorDirectory, SupabaseDoctorDirectory};
use shared_config::{AppConfig, RoomExpiryBasis, SchedulingConfig};
use video_conferencing_cell::{DailyRoomProvisioner, RoomHandle, RoomProvisioner, RoomProvisioningError};

use crate::models::{
    format_clock, Appointment, AppointmentError, BookAppointmentRequest, NewReservation,
};
use crate::services::availability::load_doctor;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};
use crate::services::time_grid::TimeGrid;

/// Attempts made to delete a reservation after a failed booking.
const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

/// Instant at which a freshly provisioned room should expire.
pub fn room_expiry(
    basis: RoomExpiryBasis,
    minutes: i64,
    appointment_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let anchor = match basis {
        RoomExpiryBasis::AppointmentStart => appointment_at,
        RoomExpiryBasis::BookingTime => now,
    };
    anchor + Duration::minutes(minutes)
}

/// Books appointments as a reserve / provision / confirm saga.
///
/// The reservation is the only step that races with other requests and it
/// is settled by the store. If the room cannot be provisioned (or the
/// confirmation write fails) the reservation is released again so the slot
/// is offered on the next availability query. A reservation whose release
/// also fails stops holding the slot once the configured hold elapses.
pub struct AppointmentBookingService {
    doctors: Arc<dyn DoctorDirectory>,
    store: Arc<dyn AppointmentStore>,
    rooms: Arc<dyn RoomProvisioner>,
    grid: TimeGrid,
    scheduling: SchedulingConfig,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        let rooms = DailyRoomProvisioner::new(config)?;

        Self::with_components(
            Arc::new(SupabaseDoctorDirectory::new(config)),
            Arc::new(SupabaseAppointmentStore::new(config)),
            Arc::new(rooms),
            config.scheduling.clone(),
        )
    }

    pub fn with_components(
        doctors: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        rooms: Arc<dyn RoomProvisioner>,
        scheduling: SchedulingConfig,
    ) -> Result<Self, AppointmentError> {
        let grid = TimeGrid::from_config(&scheduling)?;
        Ok(Self {
            doctors,
            store,
            rooms,
            grid,
            scheduling,
        })
    }

    pub async fn book(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let booking = request.validate()?;
        info!(
            "Booking appointment for patient {} with doctor {} at {}",
            patient_id, booking.doctor_id, booking.appointment_date
        );

        let doctor = load_doctor(self.doctors.as_ref(), booking.doctor_id).await?;
        self.ensure_bookable(&doctor, booking.appointment_date, now)?;

        // Step 1: claim the slot
        let new_reservation = NewReservation {
            patient_id,
            doctor_id: booking.doctor_id,
            appointment_date: booking.appointment_date,
            intake: booking.intake,
            requested_at: now,
        };
        let reservation = self
            .store
            .reserve(new_reservation, self.scheduling.stale_reservation_cutoff(now))
            .await
            .map_err(|e| {
                let mapped = AppointmentError::from(e);
                match mapped {
                    AppointmentError::SlotAlreadyBooked => warn!(
                        "Slot {} for doctor {} already taken",
                        booking.appointment_date, booking.doctor_id
                    ),
                    _ => error!("Failed to reserve slot: {}", mapped),
                }
                mapped
            })?;
        debug!("Reservation {} created", reservation.id);

        // Step 2: provision the room
        let expires_at = room_expiry(
            self.scheduling.room_expiry_basis,
            self.scheduling.room_expiry_minutes,
            reservation.appointment_date,
            now,
        );
        let room = match self.provision_room(expires_at).await {
            Ok(room) => room,
            Err(e) => {
                error!("Room provisioning failed for reservation {}: {}", reservation.id, e);
                self.release(reservation.id).await;
                return Err(e.into());
            }
        };

        // Step 3: attach the room to the reservation
        match self.store.confirm(reservation.id, &room, now).await {
            Ok(appointment) => {
                info!("Appointment {} confirmed", appointment.id);
                Ok(appointment)
            }
            Err(e) => {
                error!("Failed to confirm reservation {}: {}", reservation.id, e);
                self.release(reservation.id).await;
                Err(e.into())
            }
        }
    }

    fn ensure_bookable(
        &self,
        doctor: &Doctor,
        appointment_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let hours = &doctor.working_hours;
        if !self.grid.is_on_grid(hours, appointment_date)? {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} is not a {}-minute slot within working hours {}-{}",
                appointment_date.to_rfc3339(),
                self.grid.granularity_minutes(),
                format_clock(hours.start()),
                format_clock(hours.end())
            )));
        }
        if appointment_date <= now {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} is in the past",
                appointment_date.to_rfc3339()
            )));
        }
        Ok(())
    }

    async fn provision_room(&self, expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError> {
        let limit = self.scheduling.room_provisioning_timeout;
        tokio::time::timeout(limit, self.rooms.create(expires_at))
            .await
            .unwrap_or(Err(RoomProvisioningError::Timeout {
                seconds: limit.as_secs(),
            }))
    }

    async fn release(&self, reservation_id: Uuid) {
        warn!("Releasing reservation {}", reservation_id);
        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.store.release(reservation_id).await {
                Ok(()) => return,
                Err(e) if attempt < RELEASE_ATTEMPTS => {
                    warn!("Release attempt {} for reservation {} failed: {}", attempt, reservation_id, e);
                    tokio::time::sleep(RELEASE_BACKOFF * attempt).await;
                }
                Err(e) => error!(
                    "Giving up on reservation {}, it frees once the hold expires: {}",
                    reservation_id, e
                ),
            }
        }
    }
}
