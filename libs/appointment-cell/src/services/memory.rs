// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use video_conferencing_cell::RoomHandle;

use crate::models::{Appointment, AppointmentRecord, AppointmentStatus, NewReservation, Reservation};
use crate::services::store::{into_appointment, AppointmentStore, StoreError};

/// Store held in process memory. Reservation exclusivity is enforced under a
/// single lock, mirroring the partial unique index of the Postgres schema.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    records: Mutex<HashMap<Uuid, AppointmentRecord>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, AppointmentRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("appointment store lock poisoned".to_string()))
    }

    /// Raw row lookup, reservations included.
    pub fn record(&self, id: Uuid) -> Option<AppointmentRecord> {
        self.lock().ok().and_then(|records| records.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_stale(record: &AppointmentRecord, stale_before: DateTime<Utc>) -> bool {
        !record.is_confirmed() && record.created_at < stale_before
    }

    fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        appointments.sort_by_key(|a| a.appointment_date);
        appointments
    }

    fn list_where(
        &self,
        predicate: impl Fn(&AppointmentRecord) -> bool,
    ) -> Result<Vec<Appointment>, StoreError> {
        let records = self.lock()?;
        let appointments = records
            .values()
            .filter(|r| r.is_confirmed() && predicate(r))
            .cloned()
            .map(into_appointment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::sorted(appointments))
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn reserve(
        &self,
        reservation: NewReservation,
        stale_before: DateTime<Utc>,
    ) -> Result<Reservation, StoreError> {
        let mut records = self.lock()?;

        records.retain(|_, r| {
            !(r.doctor_id == reservation.doctor_id
                && r.appointment_date == reservation.appointment_date
                && r.status == AppointmentStatus::Upcoming
                && Self::is_stale(r, stale_before))
        });

        let taken = records.values().any(|r| {
            r.doctor_id == reservation.doctor_id
                && r.appointment_date == reservation.appointment_date
                && r.status == AppointmentStatus::Upcoming
        });
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "doctor {} already has an upcoming appointment at {}",
                reservation.doctor_id, reservation.appointment_date
            )));
        }

        let record = AppointmentRecord {
            id: Uuid::new_v4(),
            patient_id: reservation.patient_id,
            doctor_id: reservation.doctor_id,
            status: AppointmentStatus::Upcoming,
            room_url: None,
            appointment_date: reservation.appointment_date,
            age: reservation.intake.age,
            gender: reservation.intake.gender,
            symptoms: reservation.intake.symptoms,
            medications_and_allergies: reservation.intake.medications_and_allergies,
            created_at: reservation.requested_at,
            updated_at: reservation.requested_at,
        };

        let reserved = Reservation {
            id: record.id,
            doctor_id: record.doctor_id,
            appointment_date: record.appointment_date,
        };
        records.insert(record.id, record);
        Ok(reserved)
    }

    async fn release(&self, reservation_id: Uuid) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        if records.get(&reservation_id).is_some_and(|r| !r.is_confirmed()) {
            records.remove(&reservation_id);
        }
        Ok(())
    }

    async fn confirm(
        &self,
        reservation_id: Uuid,
        room: &RoomHandle,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(&reservation_id)
            .filter(|r| !r.is_confirmed())
            .ok_or(StoreError::ReservationMissing(reservation_id))?;

        record.room_url = Some(room.as_str().to_string());
        record.updated_at = now;
        into_appointment(record.clone())
    }

    async fn booked_instants(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let records = self.lock()?;
        Ok(records
            .values()
            .filter(|r| {
                r.doctor_id == doctor_id
                    && r.status == AppointmentStatus::Upcoming
                    && r.appointment_date >= from
                    && r.appointment_date < to
                    && !Self::is_stale(r, stale_before)
            })
            .map(|r| r.appointment_date)
            .collect())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut records = self.lock()?;
        let Some(record) = records.get_mut(&appointment_id).filter(|r| {
            r.patient_id == patient_id && r.status == AppointmentStatus::Upcoming && r.is_confirmed()
        }) else {
            return Ok(None);
        };

        record.status = target;
        record.updated_at = now;
        into_appointment(record.clone()).map(Some)
    }

    async fn list_for_patient(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list_where(|r| r.patient_id == patient_id && r.status == status)
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list_where(|r| r.doctor_id == doctor_id && r.status == status)
    }
}
