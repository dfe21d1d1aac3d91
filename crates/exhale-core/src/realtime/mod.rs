//! Best-effort pub/sub fan-out of per-appointment room events.

pub mod room;

pub use room::RoomRegistry;
