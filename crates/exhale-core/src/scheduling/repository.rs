//! AppointmentRepository and AvailabilitySource trait definitions.
//!
//! Follows the native async-fn-in-traits pattern (RPITIT, Rust 2024 edition).
//! Implementations live in exhale-infra.

use chrono::{DateTime, Utc, Weekday};
use exhale_types::appointment::{Appointment, AppointmentStatus};
use exhale_types::availability::AvailabilityWindow;
use exhale_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for appointment persistence.
///
/// Booking writes carry the double-booking invariant: `insert_booking` and
/// `reschedule` must re-check for overlapping active appointments and perform
/// their writes inside a single transaction, so a losing concurrent booking
/// fails with `RepositoryError::Conflict` and writes nothing.
pub trait AppointmentRepository: Send + Sync {
    /// Insert a new booking after re-validating, inside the same transaction,
    /// that no pending/confirmed appointment of the same coach or the same
    /// participant overlaps its `[start, start + duration)` window.
    fn insert_booking(
        &self,
        appointment: &Appointment,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an appointment by its unique ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Appointment>, RepositoryError>> + Send;

    /// Persist a status/rating/history change to an existing appointment.
    fn update(
        &self,
        appointment: &Appointment,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Close `closed` and insert `replacement` in one transaction, excluding
    /// `closed` from the replacement's conflict check.
    fn reschedule(
        &self,
        closed: &Appointment,
        replacement: &Appointment,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Pending/confirmed appointments of a coach whose booked window
    /// intersects `[from, to)`.
    fn active_for_coach_between(
        &self,
        coach_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Appointment>, RepositoryError>> + Send;

    /// All appointments where the principal is a party, newest first.
    fn list_for_principal(
        &self,
        principal_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Appointment>, RepositoryError>> + Send;

    /// Cancelled appointments of a participant with a scheduled start after
    /// the given instant (late-cancel rebook policy input).
    fn cancelled_for_participant_after(
        &self,
        participant_id: &Uuid,
        after: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Appointment>, RepositoryError>> + Send;

    /// Appointment counts grouped by status (status dashboard).
    fn count_by_status(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<(AppointmentStatus, u64)>, RepositoryError>> + Send;
}

/// Read-only access to coach working hours.
///
/// The windows are owned by the coach-profile collaborator; this core never
/// writes them.
pub trait AvailabilitySource: Send + Sync {
    /// Working-hours windows of a coach for one weekday.
    fn windows_for(
        &self,
        coach_id: &Uuid,
        day: Weekday,
    ) -> impl std::future::Future<Output = Result<Vec<AvailabilityWindow>, RepositoryError>> + Send;
}
