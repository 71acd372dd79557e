use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_models::auth::{AuthenticatedCaller, CallerIdentity, Role};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub daily_api_key: String,
    pub daily_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            daily_api_key: "test-daily-key".to_string(),
            daily_api_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            daily_api_key: self.daily_api_key.clone(),
            daily_api_base_url: self.daily_api_base_url.clone(),
            port: 0,
            scheduling: SchedulingConfig::default(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    /// Panics for roles AuthGate would reject; only meant for tests.
    pub fn to_caller(&self) -> AuthenticatedCaller {
        let role = Role::parse(&self.role).expect("test user has a patient or doctor role");
        AuthenticatedCaller {
            identity: CallerIdentity::new(role, self.id),
            email: Some(self.email.clone()),
            issued_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }
}

/// Canned PostgREST rows for wiremock-backed tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(doctor_id: Uuid, specialty: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "name": "Dr. Test",
            "email": "doctor@example.com",
            "specialty": specialty,
            "working_hours": { "start": start, "end": end },
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        appointment_date: DateTime<Utc>,
        status: &str,
        room_url: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "status": status,
            "room_url": room_url,
            "appointment_date": appointment_date.to_rfc3339(),
            "age": 34,
            "gender": "female",
            "symptoms": "Persistent cough",
            "medications_and_allergies": "None provided",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn unique_violation() -> serde_json::Value {
        json!({
            "code": "23505",
            "details": "Key (doctor_id, appointment_date) already exists.",
            "hint": null,
            "message": "duplicate key value violates unique constraint \"appointments_one_upcoming_per_slot\""
        })
    }

    pub fn foreign_key_violation() -> serde_json::Value {
        json!({
            "code": "23503",
            "details": "Key (patient_id) is not present in table \"patients\".",
            "hint": null,
            "message": "insert or update on table \"appointments\" violates foreign key constraint \"appointments_patient_id_fkey\""
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
