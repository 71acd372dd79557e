// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};
use video_conferencing_cell::RoomHandle;

use crate::models::{Appointment, AppointmentError, AppointmentRecord, AppointmentStatus, NewReservation, Reservation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),

    #[error("Reservation {0} no longer exists")]
    ReservationMissing(Uuid),

    #[error("Corrupt appointment record: {0}")]
    Corrupt(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::UniqueViolation(msg) => StoreError::UniqueViolation(msg),
            DatabaseError::ForeignKeyViolation(msg) => StoreError::MissingReference(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<StoreError> for AppointmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(_) => AppointmentError::SlotAlreadyBooked,
            StoreError::MissingReference(_) => AppointmentError::ValidationError(
                "Booking references a patient or doctor that does not exist".to_string(),
            ),
            other => AppointmentError::StorageError(other.to_string()),
        }
    }
}

/// Persistence the booking engine relies on.
///
/// `reserve` must be a single conditional write: at most one `upcoming`
/// row per `(doctor_id, appointment_date)`. A second writer gets
/// [`StoreError::UniqueViolation`]. Every other method touches one record
/// at a time and needs no further coordination.
///
/// A reservation created before `stale_before` is abandoned: it no longer
/// counts as booked, and `reserve` deletes it before claiming the slot.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn reserve(
        &self,
        reservation: NewReservation,
        stale_before: DateTime<Utc>,
    ) -> Result<Reservation, StoreError>;

    /// Deletes a reservation that never received a room handle.
    async fn release(&self, reservation_id: Uuid) -> Result<(), StoreError>;

    /// Attaches the room handle to a reservation, exactly once.
    async fn confirm(
        &self,
        reservation_id: Uuid,
        room: &RoomHandle,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    /// Instants of `upcoming` rows in `[from, to)`, including live
    /// reservations but not abandoned ones.
    async fn booked_instants(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;

    /// Moves an owned, confirmed, `upcoming` appointment to `target`.
    /// `None` when no row matches all of those conditions.
    async fn transition(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Confirmed appointments, ascending by instant.
    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Confirmed appointments, ascending by instant.
    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;
}

pub(crate) fn into_appointment(record: AppointmentRecord) -> Result<Appointment, StoreError> {
    Appointment::try_from(record).map_err(StoreError::Corrupt)
}

/// PostgREST-backed store. Relies on the partial unique index
/// `appointments_one_upcoming_per_slot` for reservation exclusivity.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct BookedRow {
    appointment_date: DateTime<Utc>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_records(rows: Vec<Value>) -> Result<Vec<AppointmentRecord>, StoreError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    error!("Failed to parse appointment row: {}", e);
                    StoreError::Corrupt(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect()
    }

    fn encode_instant(instant: DateTime<Utc>) -> String {
        urlencoding::encode(&instant.to_rfc3339()).into_owned()
    }

    /// Deletes abandoned reservations holding `(doctor_id, appointment_date)`.
    /// Failures are logged only; the insert that follows still reports a
    /// conflict if the slot stays held.
    async fn sweep_stale(
        &self,
        doctor_id: Uuid,
        appointment_date: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=eq.upcoming&room_url=is.null&created_at=lt.{}",
            doctor_id,
            Self::encode_instant(appointment_date),
            Self::encode_instant(stale_before),
        );

        let swept: Result<Vec<Value>, DatabaseError> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, Some(SupabaseClient::return_representation()))
            .await;

        match swept {
            Ok(rows) if !rows.is_empty() => warn!(
                "Reclaimed {} abandoned reservation(s) for doctor {} at {}",
                rows.len(),
                doctor_id,
                appointment_date
            ),
            Ok(_) => {}
            Err(e) => warn!("Failed to sweep abandoned reservations for doctor {}: {}", doctor_id, e),
        }
    }

    async fn list(&self, filter: String) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?{}&room_url=not.is.null&order=appointment_date.asc",
            filter
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        Self::parse_records(rows)?
            .into_iter()
            .map(into_appointment)
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn reserve(
        &self,
        reservation: NewReservation,
        stale_before: DateTime<Utc>,
    ) -> Result<Reservation, StoreError> {
        debug!(
            "Reserving slot {} for doctor {}",
            reservation.appointment_date, reservation.doctor_id
        );

        self.sweep_stale(reservation.doctor_id, reservation.appointment_date, stale_before)
            .await;

        let body = json!({
            "patient_id": reservation.patient_id,
            "doctor_id": reservation.doctor_id,
            "status": AppointmentStatus::Upcoming,
            "room_url": null,
            "appointment_date": reservation.appointment_date.to_rfc3339(),
            "age": reservation.intake.age,
            "gender": reservation.intake.gender,
            "symptoms": reservation.intake.symptoms,
            "medications_and_allergies": reservation.intake.medications_and_allergies,
            "created_at": reservation.requested_at.to_rfc3339(),
            "updated_at": reservation.requested_at.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let record = Self::parse_records(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Insert returned no row".to_string()))?;

        Ok(Reservation {
            id: record.id,
            doctor_id: record.doctor_id,
            appointment_date: record.appointment_date,
        })
    }

    async fn release(&self, reservation_id: Uuid) -> Result<(), StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&room_url=is.null", reservation_id);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        debug!("Released reservation {} ({} rows)", reservation_id, deleted.len());
        Ok(())
    }

    async fn confirm(
        &self,
        reservation_id: Uuid,
        room: &RoomHandle,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&room_url=is.null", reservation_id);
        let body = json!({
            "room_url": room.as_str(),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let record = Self::parse_records(rows)?
            .into_iter()
            .next()
            .ok_or(StoreError::ReservationMissing(reservation_id))?;

        into_appointment(record)
    }

    async fn booked_instants(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?select=appointment_date&doctor_id=eq.{}&status=eq.upcoming&appointment_date=gte.{}&appointment_date=lt.{}&or=(room_url.not.is.null,created_at.gte.{})",
            doctor_id,
            Self::encode_instant(from),
            Self::encode_instant(to),
            Self::encode_instant(stale_before),
        );

        let rows: Vec<BookedRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|r| r.appointment_date).collect())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&patient_id=eq.{}&status=eq.upcoming&room_url=not.is.null",
            appointment_id, patient_id
        );
        let body = json!({
            "status": target,
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        Self::parse_records(rows)?
            .into_iter()
            .next()
            .map(into_appointment)
            .transpose()
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(format!("patient_id=eq.{}&status=eq.{}", patient_id, status)).await
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(format!("doctor_id=eq.{}&status=eq.{}", doctor_id, status)).await
    }
}
