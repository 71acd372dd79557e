//! # Appointment Cell
//!
//! Slot generation, availability, booking and lifecycle for appointments.
//!
//! Booking runs as a small saga: reserve the slot in the store, provision a
//! video room, then attach the room to the reservation. A failed room request
//! releases the reservation again.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, AppointmentStatus, ErrorKind, Gender};
pub use router::appointment_routes;
