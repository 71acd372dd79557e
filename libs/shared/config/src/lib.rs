use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_DAILY_API_BASE_URL: &str = "https://api.daily.co/v1";

/// Which instant the room expiry offset is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomExpiryBasis {
    /// Expiry = scheduled appointment instant + offset.
    AppointmentStart,
    /// Expiry = instant the booking was made + offset.
    BookingTime,
}

impl FromStr for RoomExpiryBasis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "appointment_start" => Ok(RoomExpiryBasis::AppointmentStart),
            "booking_time" => Ok(RoomExpiryBasis::BookingTime),
            other => Err(format!(
                "Invalid room expiry basis '{}': expected appointment_start or booking_time",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub slot_granularity_minutes: i64,
    /// Offset of the civil clock that working hours and calendar days are read in.
    pub utc_offset_minutes: i32,
    pub room_expiry_basis: RoomExpiryBasis,
    pub room_expiry_minutes: i64,
    pub room_provisioning_timeout: Duration,
    /// Age after which a reservation still lacking a room is treated as
    /// abandoned: it stops blocking its slot and the next booking deletes it.
    pub reservation_hold: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: 30,
            utc_offset_minutes: 0,
            room_expiry_basis: RoomExpiryBasis::AppointmentStart,
            room_expiry_minutes: 60,
            room_provisioning_timeout: Duration::from_secs(10),
            reservation_hold: Duration::from_secs(120),
        }
    }
}

impl SchedulingConfig {
    /// The single time anchor used for slot generation and "today" checks.
    /// Falls back to UTC when the configured offset is out of range.
    pub fn time_anchor(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            warn!("Offset of {} minutes is out of range, anchoring to UTC", self.utc_offset_minutes);
            Utc.fix()
        })
    }

    /// Reservations created before this instant are abandoned.
    pub fn stale_reservation_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.reservation_hold)
            .ok()
            .and_then(|hold| now.checked_sub_signed(hold))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.slot_granularity_minutes <= 0 {
            return Err("Slot granularity must be positive".to_string());
        }
        if self.room_expiry_minutes <= 0 {
            return Err("Room expiry minutes must be positive".to_string());
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(format!("UTC offset of {} minutes is out of range", self.utc_offset_minutes));
        }
        if self.reservation_hold <= self.room_provisioning_timeout {
            return Err(format!(
                "Reservation hold ({}s) must exceed the room provisioning timeout ({}s)",
                self.reservation_hold.as_secs(),
                self.room_provisioning_timeout.as_secs()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub daily_api_key: String,
    pub daily_api_base_url: String,
    pub port: u16,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let scheduling = SchedulingConfig {
            slot_granularity_minutes: parsed_var("SLOT_GRANULARITY_MINUTES", defaults.slot_granularity_minutes),
            utc_offset_minutes: parsed_var("SCHEDULE_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            room_expiry_basis: parsed_var("ROOM_EXPIRY_BASIS", defaults.room_expiry_basis),
            room_expiry_minutes: parsed_var("ROOM_EXPIRY_MINUTES", defaults.room_expiry_minutes),
            room_provisioning_timeout: Duration::from_secs(parsed_var(
                "ROOM_PROVISIONING_TIMEOUT_SECS",
                defaults.room_provisioning_timeout.as_secs(),
            )),
            reservation_hold: Duration::from_secs(parsed_var(
                "RESERVATION_HOLD_SECS",
                defaults.reservation_hold.as_secs(),
            )),
        };

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            daily_api_key: env::var("DAILY_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("DAILY_API_KEY not set, using empty value");
                    String::new()
                }),
            daily_api_base_url: env::var("DAILY_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("DAILY_API_BASE_URL not set, using default");
                    DEFAULT_DAILY_API_BASE_URL.to_string()
                }),
            port: parsed_var("PORT", 3000),
            scheduling,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if let Err(e) = config.scheduling.validate() {
            warn!("Scheduling configuration is invalid: {}", e);
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_video_conferencing_configured(&self) -> bool {
        !self.daily_api_key.is_empty() && !self.daily_api_base_url.is_empty()
    }
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
