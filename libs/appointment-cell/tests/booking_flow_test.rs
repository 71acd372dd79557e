// libs/appointment-cell/tests/booking_flow_test.rs
//
// End-to-end service tests over the in-memory store and doctor directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, ErrorKind, Gender, IntakeForm,
    NewReservation, Reservation,
};
use appointment_cell::services::{
    AppointmentBookingService, AppointmentHistoryService, AppointmentLifecycleService, AppointmentStore,
    AvailabilityService, InMemoryAppointmentStore, StoreError,
};
use doctor_cell::{Doctor, InMemoryDoctorDirectory, Specialty, WorkingHours};
use shared_config::SchedulingConfig;
use video_conferencing_cell::{RoomHandle, RoomProvisioner, RoomProvisioningError};

// ==============================================================================
// FAKE ROOM PROVIDERS
// ==============================================================================

#[derive(Default)]
struct CountingRooms {
    created: AtomicUsize,
}

#[async_trait]
impl RoomProvisioner for CountingRooms {
    async fn create(&self, _expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(RoomHandle::new(format!("https://clinic.daily.co/room-{}", n)))
    }
}

struct FailingRooms;

#[async_trait]
impl RoomProvisioner for FailingRooms {
    async fn create(&self, _expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError> {
        Err(RoomProvisioningError::ProviderApiError {
            message: "Daily API returned 503".to_string(),
        })
    }
}

struct StalledRooms;

#[async_trait]
impl RoomProvisioner for StalledRooms {
    async fn create(&self, _expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError> {
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        Ok(RoomHandle::new("https://clinic.daily.co/too-late"))
    }
}

// ==============================================================================
// STORE WITH A BROKEN DELETE
// ==============================================================================

/// In-memory store whose `release` always fails, leaving reservations behind.
#[derive(Default)]
struct UnreleasableStore {
    inner: InMemoryAppointmentStore,
    release_attempts: AtomicUsize,
}

#[async_trait]
impl AppointmentStore for UnreleasableStore {
    async fn reserve(&self, reservation: NewReservation, stale_before: DateTime<Utc>) -> Result<Reservation, StoreError> {
        self.inner.reserve(reservation, stale_before).await
    }

    async fn release(&self, _reservation_id: Uuid) -> Result<(), StoreError> {
        self.release_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("connection reset".to_string()))
    }

    async fn confirm(&self, reservation_id: Uuid, room: &RoomHandle, now: DateTime<Utc>) -> Result<Appointment, StoreError> {
        self.inner.confirm(reservation_id, room, now).await
    }

    async fn booked_instants(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        self.inner.booked_instants(doctor_id, from, to, stale_before).await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, StoreError> {
        self.inner.transition(appointment_id, patient_id, target, now).await
    }

    async fn list_for_patient(&self, patient_id: Uuid, status: AppointmentStatus) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_for_patient(patient_id, status).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid, status: AppointmentStatus) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_for_doctor(doctor_id, status).await
    }
}

// ==============================================================================
// FIXTURE
// ==============================================================================

struct Clinic {
    doctor: Doctor,
    store: Arc<InMemoryAppointmentStore>,
    availability: AvailabilityService,
    booking: AppointmentBookingService,
    lifecycle: AppointmentLifecycleService,
    history: AppointmentHistoryService,
}

impl Clinic {
    fn new(start: &str, end: &str, rooms: Arc<dyn RoomProvisioner>) -> Self {
        Self::with_scheduling(start, end, rooms, SchedulingConfig::default())
    }

    fn with_scheduling(start: &str, end: &str, rooms: Arc<dyn RoomProvisioner>, scheduling: SchedulingConfig) -> Self {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Lena Park".to_string(),
            email: Some("lena.park@example.com".to_string()),
            specialty: Specialty::Cardiology,
            working_hours: WorkingHours::parse(start, end).unwrap(),
            created_at: None,
            updated_at: None,
        };
        let directory = Arc::new(InMemoryDoctorDirectory::with_doctors([doctor.clone()]));
        let store = Arc::new(InMemoryAppointmentStore::new());

        Self {
            availability: AvailabilityService::with_components(directory.clone(), store.clone(), scheduling.clone())
                .unwrap(),
            booking: AppointmentBookingService::with_components(directory, store.clone(), rooms, scheduling).unwrap(),
            lifecycle: AppointmentLifecycleService::with_store(store.clone()),
            history: AppointmentHistoryService::with_store(store.clone()),
            doctor,
            store,
        }
    }

    fn request(&self, at: DateTime<Utc>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: Some(self.doctor.id),
            appointment_date: Some(at),
            age: Some(51),
            gender: Some("female".to_string()),
            symptoms: Some("Chest tightness after exercise".to_string()),
            medications_and_allergies: Some("Penicillin".to_string()),
        }
    }

    async fn slots(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.availability
            .available_slots(Some(self.doctor.id), Some(day()), now)
            .await
            .unwrap()
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 9, 16).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 9, 16, hour, minute, 0).unwrap()
}

/// A week before `day()`.
fn last_week() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 9, 9, 12, 0, 0).unwrap()
}

fn intake() -> IntakeForm {
    IntakeForm {
        age: 51,
        gender: Gender::Female,
        symptoms: "Shortness of breath".to_string(),
        medications_and_allergies: "None provided".to_string(),
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn test_full_day_offers_sixteen_slots() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let slots = clinic.slots(last_week()).await;

    assert_eq!(slots.len(), 16);
    assert_eq!(slots.first(), Some(&at(9, 0)));
    assert_eq!(slots.last(), Some(&at(16, 30)));
}

#[tokio::test]
async fn test_booked_slot_disappears_and_second_attempt_conflicts() {
    let clinic = Clinic::new("09:00", "10:00", Arc::new(CountingRooms::default()));
    assert_eq!(clinic.slots(last_week()).await, vec![at(9, 0), at(9, 30)]);

    clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week())
        .await
        .unwrap();
    assert_eq!(clinic.slots(last_week()).await, vec![at(9, 30)]);

    let second = clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week())
        .await
        .unwrap_err();
    assert_eq!(second, AppointmentError::SlotAlreadyBooked);
    assert_eq!(second.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_past_slots_are_hidden_only_today() {
    let clinic = Clinic::new("09:00", "12:00", Arc::new(CountingRooms::default()));

    let slots = clinic.slots(at(9, 40)).await;
    assert_eq!(slots.first(), Some(&at(10, 0)));
    assert!(slots.iter().all(|s| *s > at(9, 40)));

    // Exactly on a slot boundary: that slot is gone too.
    let slots = clinic.slots(at(10, 0)).await;
    assert_eq!(slots.first(), Some(&at(10, 30)));
}

#[tokio::test]
async fn test_schedule_offset_moves_slots_and_today() {
    let scheduling = SchedulingConfig {
        utc_offset_minutes: 120,
        ..SchedulingConfig::default()
    };
    let clinic = Clinic::with_scheduling("09:00", "10:00", Arc::new(CountingRooms::default()), scheduling);

    // 09:00 at +02:00 is 07:00 UTC.
    assert_eq!(clinic.slots(last_week()).await, vec![at(7, 0), at(7, 30)]);

    // 07:10 UTC is 09:10 local on the same day: only 09:30 local remains.
    assert_eq!(clinic.slots(at(7, 10)).await, vec![at(7, 30)]);
}

#[tokio::test]
async fn test_availability_requires_parameters_and_known_doctor() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));

    assert_eq!(
        clinic.availability.available_slots(None, Some(day()), last_week()).await,
        Err(AppointmentError::MissingParameter("doctor_id"))
    );
    assert_eq!(
        clinic.availability.available_slots(Some(clinic.doctor.id), None, last_week()).await,
        Err(AppointmentError::MissingParameter("date"))
    );
    assert_eq!(
        clinic.availability.available_slots(Some(Uuid::new_v4()), Some(day()), last_week()).await,
        Err(AppointmentError::DoctorNotFound)
    );
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_have_one_winner() {
    let rooms = Arc::new(CountingRooms::default());
    let clinic = Clinic::new("09:00", "17:00", rooms.clone());

    let attempts = (0..8).map(|_| clinic.booking.book(Uuid::new_v4(), clinic.request(at(11, 0)), last_week()));
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppointmentError::SlotAlreadyBooked)))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(rooms.created.load(Ordering::SeqCst), 1);
    assert_eq!(clinic.store.len(), 1);
}

#[tokio::test]
async fn test_booking_persists_intake_and_room() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let patient_id = Uuid::new_v4();

    let appointment = clinic
        .booking
        .book(patient_id, clinic.request(at(14, 30)), last_week())
        .await
        .unwrap();

    assert_eq!(appointment.patient_id, patient_id);
    assert_eq!(appointment.doctor_id, clinic.doctor.id);
    assert_eq!(appointment.status, AppointmentStatus::Upcoming);
    assert_eq!(appointment.age, 51);
    assert_eq!(appointment.gender, Gender::Female);
    assert_eq!(appointment.medications_and_allergies, "Penicillin");
    assert_eq!(appointment.room_url.as_str(), "https://clinic.daily.co/room-0");

    let stored = clinic.store.record(appointment.id).unwrap();
    assert!(stored.is_confirmed());
}

#[tokio::test]
async fn test_failed_provisioning_returns_the_slot() {
    let clinic = Clinic::new("09:00", "10:00", Arc::new(FailingRooms));

    let result = clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 30)), last_week())
        .await;

    assert_matches!(result, Err(AppointmentError::RoomProvisioningFailed(_)));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::DependencyFailure);
    assert!(clinic.store.is_empty());
    assert_eq!(clinic.slots(last_week()).await, vec![at(9, 0), at(9, 30)]);
}

#[tokio::test]
async fn test_stalled_provisioning_times_out_and_returns_the_slot() {
    let scheduling = SchedulingConfig {
        room_provisioning_timeout: StdDuration::from_millis(50),
        ..SchedulingConfig::default()
    };
    let clinic = Clinic::with_scheduling("09:00", "10:00", Arc::new(StalledRooms), scheduling);

    let result = clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week())
        .await;

    assert_matches!(result, Err(AppointmentError::RoomProvisioningFailed(msg)) if msg.contains("timed out"));
    assert_eq!(clinic.slots(last_week()).await, vec![at(9, 0), at(9, 30)]);
}

#[tokio::test]
async fn test_invalid_intake_is_rejected_before_any_write() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let mut request = clinic.request(at(9, 0));
    request.gender = Some("unknown".to_string());

    let result = clinic.booking.book(Uuid::new_v4(), request, last_week()).await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
    assert!(clinic.store.is_empty());
}

// ==============================================================================
// LIFECYCLE & LISTINGS
// ==============================================================================

#[tokio::test]
async fn test_terminal_appointments_cannot_transition_again() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let patient_id = Uuid::new_v4();
    let appointment = clinic
        .booking
        .book(patient_id, clinic.request(at(10, 0)), last_week())
        .await
        .unwrap();

    assert_eq!(appointment.updated_at, last_week());

    let finished_at = at(10, 30);
    let completed = clinic.lifecycle.complete(appointment.id, patient_id, finished_at).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(completed.room_url, appointment.room_url);
    assert_eq!(completed.updated_at, finished_at);
    assert_eq!(completed.created_at, last_week());

    assert_eq!(
        clinic.lifecycle.cancel(appointment.id, patient_id, last_week()).await,
        Err(AppointmentError::NotFound)
    );
    assert_eq!(
        clinic.lifecycle.complete(appointment.id, patient_id, last_week()).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_transitions_hide_foreign_and_missing_appointments() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let owner = Uuid::new_v4();
    let appointment = clinic
        .booking
        .book(owner, clinic.request(at(10, 0)), last_week())
        .await
        .unwrap();

    assert_eq!(
        clinic.lifecycle.cancel(appointment.id, Uuid::new_v4(), last_week()).await,
        Err(AppointmentError::NotFound)
    );
    assert_eq!(
        clinic.lifecycle.cancel(Uuid::new_v4(), owner, last_week()).await,
        Err(AppointmentError::NotFound)
    );
    assert_matches!(
        clinic
            .lifecycle
            .transition(appointment.id, owner, AppointmentStatus::Upcoming, last_week())
            .await,
        Err(AppointmentError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_cancelled_slot_can_be_booked_again() {
    let clinic = Clinic::new("09:00", "10:00", Arc::new(CountingRooms::default()));
    let patient_id = Uuid::new_v4();
    let appointment = clinic
        .booking
        .book(patient_id, clinic.request(at(9, 0)), last_week())
        .await
        .unwrap();

    clinic.lifecycle.cancel(appointment.id, patient_id, last_week()).await.unwrap();
    assert_eq!(clinic.slots(last_week()).await, vec![at(9, 0), at(9, 30)]);

    assert!(clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_listings_are_ordered_and_skip_reservations() {
    let clinic = Clinic::new("09:00", "17:00", Arc::new(CountingRooms::default()));
    let patient_id = Uuid::new_v4();

    for slot in [at(15, 0), at(9, 0), at(12, 30)] {
        clinic
            .booking
            .book(patient_id, clinic.request(slot), last_week())
            .await
            .unwrap();
    }

    // A bare reservation holds its slot but is not an appointment yet.
    clinic
        .store
        .reserve(
            NewReservation {
                patient_id,
                doctor_id: clinic.doctor.id,
                appointment_date: at(16, 0),
                intake: intake(),
                requested_at: last_week(),
            },
            SchedulingConfig::default().stale_reservation_cutoff(last_week()),
        )
        .await
        .unwrap();
    assert!(!clinic.slots(last_week()).await.contains(&at(16, 0)));

    let upcoming = clinic.history.upcoming_for_patient(patient_id).await.unwrap();
    let instants: Vec<_> = upcoming.iter().map(|a| a.appointment_date).collect();
    assert_eq!(instants, vec![at(9, 0), at(12, 30), at(15, 0)]);

    let for_doctor = clinic.history.upcoming_for_doctor(clinic.doctor.id).await.unwrap();
    assert_eq!(for_doctor.len(), 3);

    for appointment in &upcoming[..2] {
        clinic.lifecycle.complete(appointment.id, patient_id, last_week()).await.unwrap();
    }
    let past = clinic.history.past_for_patient(patient_id).await.unwrap();
    let instants: Vec<_> = past.iter().map(|a| a.appointment_date).collect();
    assert_eq!(instants, vec![at(12, 30), at(9, 0)]);

    assert_eq!(clinic.history.upcoming_for_patient(patient_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reservation_expiry_window_is_deterministic() {
    // Booking far ahead: with the default basis the room outlives the appointment.
    let far_ahead = at(9, 0) + Duration::days(60);
    let expires = appointment_cell::services::booking::room_expiry(
        shared_config::RoomExpiryBasis::AppointmentStart,
        60,
        far_ahead,
        last_week(),
    );
    assert!(expires > far_ahead);

    let expires = appointment_cell::services::booking::room_expiry(
        shared_config::RoomExpiryBasis::BookingTime,
        60,
        far_ahead,
        last_week(),
    );
    assert!(expires < far_ahead);
}

// ==============================================================================
// ABANDONED RESERVATIONS
// ==============================================================================

#[tokio::test]
async fn test_unreleased_reservation_frees_its_slot_after_the_hold() {
    let clinic = Clinic::new("09:00", "10:00", Arc::new(CountingRooms::default()));
    let store = Arc::new(UnreleasableStore::default());
    let directory = Arc::new(InMemoryDoctorDirectory::with_doctors([clinic.doctor.clone()]));
    let scheduling = SchedulingConfig::default();

    let failing = AppointmentBookingService::with_components(
        directory.clone(),
        store.clone(),
        Arc::new(FailingRooms),
        scheduling.clone(),
    )
    .unwrap();
    let healthy = AppointmentBookingService::with_components(
        directory.clone(),
        store.clone(),
        Arc::new(CountingRooms::default()),
        scheduling.clone(),
    )
    .unwrap();
    let availability = AvailabilityService::with_components(directory, store.clone(), scheduling.clone()).unwrap();
    let slots = |now: DateTime<Utc>| availability.available_slots(Some(clinic.doctor.id), Some(day()), now);

    let result = failing.book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week()).await;
    assert_matches!(result, Err(AppointmentError::RoomProvisioningFailed(_)));
    assert_eq!(store.release_attempts.load(Ordering::SeqCst), 3);

    // Still held while the booking could plausibly be in flight.
    assert_eq!(slots(last_week()).await.unwrap(), vec![at(9, 30)]);
    assert_matches!(
        healthy.book(Uuid::new_v4(), clinic.request(at(9, 0)), last_week()).await,
        Err(AppointmentError::SlotAlreadyBooked)
    );

    let later = last_week() + Duration::hours(1);
    assert_eq!(slots(later).await.unwrap(), vec![at(9, 0), at(9, 30)]);

    let appointment = healthy
        .book(Uuid::new_v4(), clinic.request(at(9, 0)), later)
        .await
        .unwrap();
    assert_eq!(appointment.appointment_date, at(9, 0));
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn test_reservation_orphaned_mid_booking_is_reclaimed() {
    let clinic = Clinic::new("09:00", "10:00", Arc::new(CountingRooms::default()));
    let hold = SchedulingConfig::default().reservation_hold;

    // A booking that reserved and then never came back.
    clinic
        .store
        .reserve(
            NewReservation {
                patient_id: Uuid::new_v4(),
                doctor_id: clinic.doctor.id,
                appointment_date: at(9, 30),
                intake: intake(),
                requested_at: last_week(),
            },
            SchedulingConfig::default().stale_reservation_cutoff(last_week()),
        )
        .await
        .unwrap();

    let within_hold = last_week() + Duration::seconds(30);
    assert_eq!(clinic.slots(within_hold).await, vec![at(9, 0)]);

    let after_hold = last_week() + Duration::from_std(hold).unwrap() + Duration::seconds(1);
    assert_eq!(clinic.slots(after_hold).await, vec![at(9, 0), at(9, 30)]);

    let appointment = clinic
        .booking
        .book(Uuid::new_v4(), clinic.request(at(9, 30)), after_hold)
        .await
        .unwrap();
    assert_eq!(clinic.store.len(), 1);
    assert!(clinic.store.record(appointment.id).unwrap().is_confirmed());
}
