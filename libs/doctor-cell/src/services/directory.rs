use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Doctor, DoctorError, Specialty};

/// Read access to doctor records needed by scheduling.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    async fn by_specialty(&self, specialty: Specialty) -> Result<Vec<Doctor>, DoctorError>;
}

pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Doctor>, DoctorError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    error!("Failed to parse doctor row: {}", e);
                    DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,name,email,specialty,working_hours,created_at,updated_at",
            doctor_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn by_specialty(&self, specialty: Specialty) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Fetching doctors with specialty: {}", specialty);

        let path = format!(
            "/rest/v1/doctors?specialty=eq.{}&select=id,name,email,specialty,working_hours,created_at,updated_at&order=name.asc",
            urlencoding::encode(specialty.as_str())
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Self::parse_rows(rows)
    }
}

/// Directory held in memory, for local runs and tests.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        let directory = Self::new();
        for doctor in doctors {
            directory.insert(doctor);
        }
        directory
    }

    pub fn insert(&self, doctor: Doctor) {
        if let Ok(mut doctors) = self.doctors.write() {
            doctors.insert(doctor.id, doctor);
        }
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let doctors = self
            .doctors
            .read()
            .map_err(|_| DoctorError::DatabaseError("doctor directory lock poisoned".to_string()))?;
        Ok(doctors.get(&doctor_id).cloned())
    }

    async fn by_specialty(&self, specialty: Specialty) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self
            .doctors
            .read()
            .map_err(|_| DoctorError::DatabaseError("doctor directory lock poisoned".to_string()))?;
        let mut matching: Vec<Doctor> = doctors
            .values()
            .filter(|d| d.specialty == specialty)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}
