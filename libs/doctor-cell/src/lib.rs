pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{Doctor, DoctorError, DoctorProfile, Specialty, WorkingHours};
pub use services::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
pub use router::doctor_routes;
