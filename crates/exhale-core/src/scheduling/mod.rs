//! Appointment booking: availability resolution and the status lifecycle.

pub mod availability;
pub mod lifecycle;
pub mod repository;

pub use availability::AvailabilityResolver;
pub use lifecycle::AppointmentService;
