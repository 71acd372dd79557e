pub mod directory;

pub use directory::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
