// libs/video-conferencing-cell/src/services/daily.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{DailyRoomRequest, DailyRoomResponse, RoomHandle, RoomProvisioningError};
use crate::services::provisioner::RoomProvisioner;

/// Daily.co REST client for time-limited rooms.
/// Based on: https://docs.daily.co/reference/rest-api/rooms/create-room
pub struct DailyRoomProvisioner {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DailyRoomProvisioner {
    pub fn new(config: &AppConfig) -> Result<Self, RoomProvisioningError> {
        if !config.is_video_conferencing_configured() {
            return Err(RoomProvisioningError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.daily_api_key.clone(),
            base_url: config.daily_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET / returns the domain configuration when the key is accepted.
    pub async fn health_check(&self) -> Result<bool, RoomProvisioningError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl RoomProvisioner for DailyRoomProvisioner {
    /// POST /rooms with `properties.exp`
    async fn create(&self, expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError> {
        let url = format!("{}/rooms", self.base_url);
        debug!("Requesting room expiring at {} from {}", expires_at, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&DailyRoomRequest::expiring_at(expires_at))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Room creation failed: {} - {}", status, response_text);
            return Err(RoomProvisioningError::ProviderApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let room: DailyRoomResponse = serde_json::from_str(&response_text).map_err(|e| {
            RoomProvisioningError::ProviderApiError {
                message: format!("Failed to parse room response: {}", e),
            }
        })?;

        let url = room
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(RoomProvisioningError::MissingRoomUrl)?;

        info!("Provisioned room {}", room.name.as_deref().unwrap_or("<unnamed>"));
        Ok(RoomHandle::new(url))
    }
}
