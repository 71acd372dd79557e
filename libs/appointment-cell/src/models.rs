// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::DoctorError;
use video_conferencing_cell::{RoomHandle, RoomProvisioningError};

use crate::services::time_grid::TimeGridError;

pub const DEFAULT_MEDICATIONS_AND_ALLERGIES: &str = "None provided";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A confirmed booking. Always carries its room handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: AppointmentStatus,
    pub room_url: RoomHandle,
    pub appointment_date: DateTime<Utc>,
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
    pub medications_and_allergies: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row as persisted. `room_url` is null while the slot is only reserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: AppointmentStatus,
    pub room_url: Option<String>,
    pub appointment_date: DateTime<Utc>,
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
    pub medications_and_allergies: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRecord {
    pub fn is_confirmed(&self) -> bool {
        self.room_url.is_some()
    }
}

impl TryFrom<AppointmentRecord> for Appointment {
    type Error = String;

    fn try_from(record: AppointmentRecord) -> Result<Self, Self::Error> {
        let room_url = record
            .room_url
            .ok_or_else(|| format!("appointment {} has no room handle", record.id))?;

        Ok(Appointment {
            id: record.id,
            patient_id: record.patient_id,
            doctor_id: record.doctor_id,
            status: record.status,
            room_url: RoomHandle::new(room_url),
            appointment_date: record.appointment_date,
            age: record.age,
            gender: record.gender,
            symptoms: record.symptoms,
            medications_and_allergies: record.medications_and_allergies,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Exclusive claim on a `(doctor, instant)` pair, before a room exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub intake: IntakeForm,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Upcoming => "upcoming",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upcoming" => Ok(AppointmentStatus::Upcoming),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!("Invalid status: '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl FromStr for Gender {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "prefer_not_to_say" => Ok(Gender::PreferNotToSay),
            other => Err(AppointmentError::ValidationError(format!(
                "Invalid gender: '{}'. Must be one of: male, female, other, prefer_not_to_say",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeForm {
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
    pub medications_and_allergies: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking body as sent by clients. Everything is optional here so missing
/// fields are reported by validation rather than by the JSON layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(default, alias = "doctorId")]
    pub doctor_id: Option<Uuid>,
    #[serde(default, alias = "appointmentDate")]
    pub appointment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default, alias = "medicationsAndAllergies")]
    pub medications_and_allergies: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBooking {
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub intake: IntakeForm,
}

impl BookAppointmentRequest {
    pub fn validate(self) -> Result<ValidatedBooking, AppointmentError> {
        let symptoms = self
            .symptoms
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if self.doctor_id.is_none() {
            missing.push("doctor_id");
        }
        if self.appointment_date.is_none() {
            missing.push("appointment_date");
        }
        if self.age.is_none() {
            missing.push("age");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        if symptoms.is_none() {
            missing.push("symptoms");
        }
        if !missing.is_empty() {
            return Err(AppointmentError::MissingRequiredField(missing.join(", ")));
        }

        let (Some(doctor_id), Some(appointment_date), Some(age), Some(gender), Some(symptoms)) =
            (self.doctor_id, self.appointment_date, self.age, self.gender, symptoms)
        else {
            return Err(AppointmentError::MissingRequiredField("booking".to_string()));
        };

        let age = u32::try_from(age)
            .ok()
            .filter(|a| *a > 0)
            .ok_or_else(|| AppointmentError::ValidationError("Age must be a positive integer".to_string()))?;

        let gender: Gender = gender.parse()?;

        let medications_and_allergies = self
            .medications_and_allergies
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MEDICATIONS_AND_ALLERGIES.to_string());

        Ok(ValidatedBooking {
            doctor_id,
            appointment_date,
            intake: IntakeForm {
                age,
                gender,
                symptoms,
                medications_and_allergies,
            },
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    #[serde(default, alias = "doctorId")]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client fault; do not retry.
    Validation,
    /// Missing, not owned, or not in a state that allows the operation.
    NotFound,
    /// Slot taken; re-query availability and pick another slot.
    Conflict,
    /// External dependency failed; the whole attempt may be retried.
    DependencyFailure,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Missing required fields: {0}")]
    MissingRequiredField(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Requested time is not a bookable slot: {0}")]
    InvalidSlot(String),

    #[error(transparent)]
    TimeGrid(#[from] TimeGridError),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment slot already booked")]
    SlotAlreadyBooked,

    #[error("Room provisioning failed: {0}")]
    RoomProvisioningFailed(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::MissingParameter(_)
            | AppointmentError::MissingRequiredField(_)
            | AppointmentError::ValidationError(_)
            | AppointmentError::InvalidSlot(_)
            | AppointmentError::TimeGrid(_) => ErrorKind::Validation,
            AppointmentError::DoctorNotFound | AppointmentError::NotFound => ErrorKind::NotFound,
            AppointmentError::SlotAlreadyBooked => ErrorKind::Conflict,
            AppointmentError::RoomProvisioningFailed(_) => ErrorKind::DependencyFailure,
            AppointmentError::StorageError(_) => ErrorKind::Storage,
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            other => AppointmentError::StorageError(other.to_string()),
        }
    }
}

impl From<RoomProvisioningError> for AppointmentError {
    fn from(e: RoomProvisioningError) -> Self {
        AppointmentError::RoomProvisioningFailed(e.to_string())
    }
}

pub(crate) fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
