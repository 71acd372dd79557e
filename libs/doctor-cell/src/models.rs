use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub specialty: Specialty,
    #[serde(default)]
    pub working_hours: WorkingHours,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Public view of a doctor, safe to return from unauthenticated routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub name: String,
    pub specialty: Specialty,
    pub working_hours: WorkingHours,
}

impl From<Doctor> for DoctorProfile {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            specialty: doctor.specialty,
            working_hours: doctor.working_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Specialty {
    Cardiology,
    Dermatology,
    Pediatrics,
    Neurology,
    #[serde(rename = "General Practice")]
    GeneralPractice,
}

impl Specialty {
    pub const ALL: [Specialty; 5] = [
        Specialty::Cardiology,
        Specialty::Dermatology,
        Specialty::Pediatrics,
        Specialty::Neurology,
        Specialty::GeneralPractice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Cardiology => "Cardiology",
            Specialty::Dermatology => "Dermatology",
            Specialty::Pediatrics => "Pediatrics",
            Specialty::Neurology => "Neurology",
            Specialty::GeneralPractice => "General Practice",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialty {
    type Err = DoctorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Specialty::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| DoctorError::InvalidSpecialty(value.to_string()))
    }
}

/// Daily working window `[start, end)` in the schedule's civil clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkingHoursRecord", into = "WorkingHoursRecord")]
pub struct WorkingHours {
    start: NaiveTime,
    end: NaiveTime,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, DoctorError> {
        if start >= end {
            return Err(DoctorError::InvalidWorkingHours(format!(
                "start {} must be before end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `"HH:MM"` (or `"HH:MM:SS"`) clock strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, DoctorError> {
        Self::new(parse_clock(start)?, parse_clock(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkingHoursRecord {
    start: String,
    end: String,
}

impl TryFrom<WorkingHoursRecord> for WorkingHours {
    type Error = DoctorError;

    fn try_from(record: WorkingHoursRecord) -> Result<Self, Self::Error> {
        WorkingHours::parse(&record.start, &record.end)
    }
}

impl From<WorkingHours> for WorkingHoursRecord {
    fn from(hours: WorkingHours) -> Self {
        Self {
            start: hours.start.format("%H:%M").to_string(),
            end: hours.end.format("%H:%M").to_string(),
        }
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, DoctorError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| DoctorError::InvalidWorkingHours(format!("'{}' is not a HH:MM clock time", value)))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Invalid specialty: {0}")]
    InvalidSpecialty(String),

    #[error("Invalid working hours: {0}")]
    InvalidWorkingHours(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
