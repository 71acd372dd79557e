pub mod daily;
pub mod provisioner;

pub use daily::DailyRoomProvisioner;
pub use provisioner::RoomProvisioner;
