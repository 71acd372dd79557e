// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Provisions the ephemeral video rooms attached to appointments.
//!
//! The booking engine depends only on [`RoomProvisioner`]; rooms are asked to
//! expire at a given instant and are never deleted explicitly.
//! [`DailyRoomProvisioner`] is the production implementation.
//!
//! ## Configuration
//!
//! - `DAILY_API_KEY` - provider API key
//! - `DAILY_API_BASE_URL` - API base URL (optional, defaults to production)

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{RoomHandle, RoomProvisioningError};
pub use services::{DailyRoomProvisioner, RoomProvisioner};
pub use router::video_conferencing_routes;
