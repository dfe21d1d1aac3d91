//! SQLite appointment repository implementation.
//!
//! Implements `AppointmentRepository` from `exhale-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, history stored
//! as JSON. Booking writes run their overlap re-check inside the same writer
//! transaction as the insert, so a losing concurrent booking fails with
//! `Conflict` and writes nothing.

use chrono::{DateTime, Utc};
use exhale_core::scheduling::repository::AppointmentRepository;
use exhale_types::appointment::{Appointment, AppointmentStatus, HistoryEntry, Rating};
use exhale_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AppointmentRepository`.
///
/// Cloning shares the underlying pool; the lifecycle service clones one
/// handle into its availability resolver.
#[derive(Clone)]
pub struct SqliteAppointmentRepository {
    pool: DatabasePool,
}

impl SqliteAppointmentRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain Appointment.
struct AppointmentRow {
    id: String,
    participant_id: String,
    coach_id: String,
    scheduled_start: String,
    duration_minutes: i64,
    status: String,
    notes: Option<String>,
    rating_score: Option<i64>,
    rating_feedback: Option<String>,
    rating_at: Option<String>,
    history_json: String,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            participant_id: row.try_get("participant_id")?,
            coach_id: row.try_get("coach_id")?,
            scheduled_start: row.try_get("scheduled_start")?,
            duration_minutes: row.try_get("duration_minutes")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            rating_score: row.try_get("rating_score")?,
            rating_feedback: row.try_get("rating_feedback")?,
            rating_at: row.try_get("rating_at")?,
            history_json: row.try_get("history_json")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_appointment(self) -> Result<Appointment, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid appointment id: {e}")))?;
        let participant_id = Uuid::parse_str(&self.participant_id)
            .map_err(|e| RepositoryError::Query(format!("invalid participant_id: {e}")))?;
        let coach_id = Uuid::parse_str(&self.coach_id)
            .map_err(|e| RepositoryError::Query(format!("invalid coach_id: {e}")))?;
        let scheduled_start = parse_datetime(&self.scheduled_start)?;
        let status: AppointmentStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let history: Vec<HistoryEntry> = serde_json::from_str(&self.history_json)
            .map_err(|e| RepositoryError::Query(format!("invalid history_json: {e}")))?;

        let rating = match (self.rating_score, self.rating_at) {
            (Some(score), Some(rated_at)) => Some(Rating {
                score: score as u8,
                feedback: self.rating_feedback,
                rated_at: parse_datetime(&rated_at)?,
            }),
            _ => None,
        };

        Ok(Appointment {
            id,
            participant_id,
            coach_id,
            scheduled_start,
            duration_minutes: self.duration_minutes as u32,
            status,
            notes: self.notes,
            rating,
            history,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn history_json(appointment: &Appointment) -> Result<String, RepositoryError> {
    serde_json::to_string(&appointment.history)
        .map_err(|e| RepositoryError::Query(format!("cannot encode history: {e}")))
}

fn rows_to_appointments(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Appointment>, RepositoryError> {
    let mut appointments = Vec::with_capacity(rows.len());
    for row in rows {
        let appt_row =
            AppointmentRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        appointments.push(appt_row.into_appointment()?);
    }
    Ok(appointments)
}

/// Active bookings of the same coach or participant, fetched inside the
/// given transaction. The overlap test runs in Rust: the candidate set is
/// two parties' pending/confirmed appointments, which stays small.
async fn active_for_parties(
    tx: &mut sqlx::SqliteConnection,
    coach_id: &Uuid,
    participant_id: &Uuid,
) -> Result<Vec<Appointment>, RepositoryError> {
    let rows = sqlx::query(
        r#"SELECT * FROM appointments
           WHERE status IN ('pending', 'confirmed')
             AND (coach_id = ? OR participant_id = ?)"#,
    )
    .bind(coach_id.to_string())
    .bind(participant_id.to_string())
    .fetch_all(tx)
    .await
    .map_err(|e| RepositoryError::Query(e.to_string()))?;

    rows_to_appointments(&rows)
}

fn overlap_conflict(
    existing: &[Appointment],
    candidate: &Appointment,
    exclude: Option<Uuid>,
) -> bool {
    let start = candidate.scheduled_start;
    let end = candidate.scheduled_end();
    existing
        .iter()
        .any(|a| Some(a.id) != exclude && a.overlaps(start, end))
}

async fn insert_row(
    tx: &mut sqlx::SqliteConnection,
    appointment: &Appointment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO appointments
               (id, participant_id, coach_id, scheduled_start, duration_minutes, status,
                notes, rating_score, rating_feedback, rating_at, history_json, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(appointment.id.to_string())
    .bind(appointment.participant_id.to_string())
    .bind(appointment.coach_id.to_string())
    .bind(format_datetime(&appointment.scheduled_start))
    .bind(appointment.duration_minutes as i64)
    .bind(appointment.status.to_string())
    .bind(&appointment.notes)
    .bind(appointment.rating.as_ref().map(|r| r.score as i64))
    .bind(appointment.rating.as_ref().and_then(|r| r.feedback.clone()))
    .bind(appointment.rating.as_ref().map(|r| format_datetime(&r.rated_at)))
    .bind(history_json(appointment)?)
    .bind(format_datetime(&appointment.created_at))
    .bind(format_datetime(&appointment.updated_at))
    .execute(tx)
    .await
    .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(())
}

async fn update_row(
    tx: &mut sqlx::SqliteConnection,
    appointment: &Appointment,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r#"UPDATE appointments
           SET scheduled_start = ?, duration_minutes = ?, status = ?, notes = ?,
               rating_score = ?, rating_feedback = ?, rating_at = ?,
               history_json = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(format_datetime(&appointment.scheduled_start))
    .bind(appointment.duration_minutes as i64)
    .bind(appointment.status.to_string())
    .bind(&appointment.notes)
    .bind(appointment.rating.as_ref().map(|r| r.score as i64))
    .bind(appointment.rating.as_ref().and_then(|r| r.feedback.clone()))
    .bind(appointment.rating.as_ref().map(|r| format_datetime(&r.rated_at)))
    .bind(history_json(appointment)?)
    .bind(format_datetime(&appointment.updated_at))
    .bind(appointment.id.to_string())
    .execute(tx)
    .await
    .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// AppointmentRepository implementation
// ---------------------------------------------------------------------------

impl AppointmentRepository for SqliteAppointmentRepository {
    async fn insert_booking(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Commit-time re-validation: the check and the insert share one
        // transaction on the single writer connection.
        let existing = active_for_parties(
            &mut *tx,
            &appointment.coach_id,
            &appointment.participant_id,
        )
        .await?;
        if overlap_conflict(&existing, appointment, None) {
            return Err(RepositoryError::Conflict(
                "overlapping active booking".to_string(),
            ));
        }

        insert_row(&mut *tx, appointment).await?;
        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Appointment>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let appt_row = AppointmentRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(appt_row.into_appointment()?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let affected = update_row(&mut *tx, appointment).await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn reschedule(
        &self,
        closed: &Appointment,
        replacement: &Appointment,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // The closed record is excluded from its replacement's conflict
        // check; its own status flips to rescheduled in the same commit.
        let existing = active_for_parties(
            &mut *tx,
            &replacement.coach_id,
            &replacement.participant_id,
        )
        .await?;
        if overlap_conflict(&existing, replacement, Some(closed.id)) {
            return Err(RepositoryError::Conflict(
                "overlapping active booking".to_string(),
            ));
        }

        let affected = update_row(&mut *tx, closed).await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        insert_row(&mut *tx, replacement).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn active_for_coach_between(
        &self,
        coach_id: &Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        // scheduled_start bounds the window on one side; the end-side overlap
        // test needs the duration and runs in Rust after mapping.
        let rows = sqlx::query(
            r#"SELECT * FROM appointments
               WHERE coach_id = ?
                 AND status IN ('pending', 'confirmed')
                 AND scheduled_start < ?
               ORDER BY scheduled_start ASC"#,
        )
        .bind(coach_id.to_string())
        .bind(format_datetime(&to))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let appointments = rows_to_appointments(&rows)?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.overlaps(from, to))
            .collect())
    }

    async fn list_for_principal(
        &self,
        principal_id: &Uuid,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM appointments
               WHERE participant_id = ? OR coach_id = ?
               ORDER BY scheduled_start DESC"#,
        )
        .bind(principal_id.to_string())
        .bind(principal_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_appointments(&rows)
    }

    async fn cancelled_for_participant_after(
        &self,
        participant_id: &Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM appointments
               WHERE participant_id = ?
                 AND status = 'cancelled'
                 AND scheduled_start > ?"#,
        )
        .bind(participant_id.to_string())
        .bind(format_datetime(&after))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_appointments(&rows)
    }

    async fn count_by_status(
        &self,
    ) -> Result<Vec<(AppointmentStatus, u64)>, RepositoryError> {
        let rows =
            sqlx::query("SELECT status, COUNT(*) as cnt FROM appointments GROUP BY status")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: String = row
                .try_get("status")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let count: i64 = row
                .try_get("cnt")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let status: AppointmentStatus = status
                .parse()
                .map_err(|e: String| RepositoryError::Query(e))?;
            counts.push((status, count as u64));
        }
        Ok(counts)
    }
}
