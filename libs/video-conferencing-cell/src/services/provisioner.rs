use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{RoomHandle, RoomProvisioningError};

/// Creates ephemeral rooms that expire on their own at `expires_at`.
/// No explicit delete is needed.
#[async_trait]
pub trait RoomProvisioner: Send + Sync {
    async fn create(&self, expires_at: DateTime<Utc>) -> Result<RoomHandle, RoomProvisioningError>;
}
