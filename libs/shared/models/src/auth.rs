use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<i64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub iat: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

/// Who is calling, as resolved from a bearer credential. Exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum CallerIdentity {
    Patient(Uuid),
    Doctor(Uuid),
}

impl CallerIdentity {
    pub fn new(role: Role, id: Uuid) -> Self {
        match role {
            Role::Patient => CallerIdentity::Patient(id),
            Role::Doctor => CallerIdentity::Doctor(id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CallerIdentity::Patient(id) | CallerIdentity::Doctor(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            CallerIdentity::Patient(_) => Role::Patient,
            CallerIdentity::Doctor(_) => Role::Doctor,
        }
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        match self {
            CallerIdentity::Patient(id) => Some(*id),
            CallerIdentity::Doctor(_) => None,
        }
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self {
            CallerIdentity::Doctor(id) => Some(*id),
            CallerIdentity::Patient(_) => None,
        }
    }
}

/// Authenticated caller plus the token metadata that came with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedCaller {
    pub identity: CallerIdentity,
    pub email: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}
