use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to a provisioned room; both parties join with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomHandle(String);

impl RoomHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRoomRequest {
    pub properties: DailyRoomProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRoomProperties {
    /// Unix seconds after which the provider tears the room down.
    pub exp: i64,
}

impl DailyRoomRequest {
    pub fn expiring_at(expires_at: DateTime<Utc>) -> Self {
        Self {
            properties: DailyRoomProperties {
                exp: expires_at.timestamp(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyRoomResponse {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomProvisioningError {
    #[error("Video conferencing not configured")]
    NotConfigured,

    #[error("Room provider API error: {message}")]
    ProviderApiError { message: String },

    #[error("Room provider returned no room url")]
    MissingRoomUrl,

    #[error("Room provider request failed: {message}")]
    Transport { message: String },

    #[error("Room provisioning timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl From<reqwest::Error> for RoomProvisioningError {
    fn from(e: reqwest::Error) -> Self {
        RoomProvisioningError::Transport { message: e.to_string() }
    }
}
