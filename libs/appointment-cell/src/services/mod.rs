pub mod availability;
pub mod booking;
pub mod history;
pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod time_grid;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use history::AppointmentHistoryService;
pub use lifecycle::AppointmentLifecycleService;
pub use memory::InMemoryAppointmentStore;
pub use store::{AppointmentStore, StoreError, SupabaseAppointmentStore};
pub use time_grid::{TimeGrid, TimeGridError};
