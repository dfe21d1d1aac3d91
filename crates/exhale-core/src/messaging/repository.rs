//! MessageRepository trait definition.
//!
//! Same RPITIT pattern as `AppointmentRepository`; the SQLite implementation
//! lives in exhale-infra.

use chrono::{DateTime, Utc};
use exhale_types::error::RepositoryError;
use exhale_types::message::{AppointmentMessage, Role};
use uuid::Uuid;

/// Repository trait for the per-appointment message log.
pub trait MessageRepository: Send + Sync {
    /// Append a message, assigning the next id in the appointment's sequence
    /// atomically with the insert. The sender's own read flag starts true,
    /// the counterpart's false. Returns the persisted message.
    fn append(
        &self,
        appointment_id: &Uuid,
        sender_role: Role,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<AppointmentMessage, RepositoryError>> + Send;

    /// Full message log for an appointment, ordered by (created_at, id).
    fn list(
        &self,
        appointment_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AppointmentMessage>, RepositoryError>> + Send;

    /// Flip the reader's flag to true on all counterpart-authored messages.
    /// Idempotent; returns the number of rows that actually changed.
    fn mark_read(
        &self,
        appointment_id: &Uuid,
        reader_role: Role,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Total messages across all appointments (status dashboard).
    fn count_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
