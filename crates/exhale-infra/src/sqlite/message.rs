//! SQLite message repository implementation.
//!
//! The message id is a per-appointment sequence, assigned inside the same
//! writer transaction as the insert, so ids are monotonic and gap-checks are
//! never needed. Read flags only ever flip false to true.

use chrono::{DateTime, Utc};
use exhale_core::messaging::repository::MessageRepository;
use exhale_types::error::RepositoryError;
use exhale_types::message::{AppointmentMessage, Role};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain AppointmentMessage.
struct MessageRow {
    id: i64,
    appointment_id: String,
    sender_role: String,
    text: String,
    created_at: String,
    read_by_participant: bool,
    read_by_coach: bool,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            appointment_id: row.try_get("appointment_id")?,
            sender_role: row.try_get("sender_role")?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
            read_by_participant: row.try_get("read_by_participant")?,
            read_by_coach: row.try_get("read_by_coach")?,
        })
    }

    fn into_message(self) -> Result<AppointmentMessage, RepositoryError> {
        let appointment_id = Uuid::parse_str(&self.appointment_id)
            .map_err(|e| RepositoryError::Query(format!("invalid appointment_id: {e}")))?;
        let sender_role: Role = self
            .sender_role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(AppointmentMessage {
            id: self.id,
            appointment_id,
            sender_role,
            text: self.text,
            created_at,
            read_by_participant: self.read_by_participant,
            read_by_coach: self.read_by_coach,
        })
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn append(
        &self,
        appointment_id: &Uuid,
        sender_role: Role,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<AppointmentMessage, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query(
            "SELECT COALESCE(MAX(id), 0) + 1 AS next_id FROM appointment_messages WHERE appointment_id = ?",
        )
        .bind(appointment_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let next_id: i64 = row
            .try_get("next_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let message = AppointmentMessage {
            id: next_id,
            appointment_id: *appointment_id,
            sender_role,
            text: text.to_string(),
            created_at,
            read_by_participant: sender_role == Role::Participant,
            read_by_coach: sender_role == Role::Coach,
        };

        sqlx::query(
            r#"INSERT INTO appointment_messages
                   (id, appointment_id, sender_role, text, created_at, read_by_participant, read_by_coach)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id)
        .bind(message.appointment_id.to_string())
        .bind(message.sender_role.to_string())
        .bind(&message.text)
        .bind(message.created_at.to_rfc3339())
        .bind(message.read_by_participant)
        .bind(message.read_by_coach)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(message)
    }

    async fn list(
        &self,
        appointment_id: &Uuid,
    ) -> Result<Vec<AppointmentMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM appointment_messages WHERE appointment_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(appointment_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }
        Ok(messages)
    }

    async fn mark_read(
        &self,
        appointment_id: &Uuid,
        reader_role: Role,
    ) -> Result<u64, RepositoryError> {
        let column = match reader_role {
            Role::Participant => "read_by_participant",
            Role::Coach => "read_by_coach",
        };
        // Only counterpart-authored rows that are still unread change, which
        // is what makes repeated calls no-ops.
        let sql = format!(
            "UPDATE appointment_messages SET {column} = 1
             WHERE appointment_id = ? AND sender_role = ? AND {column} = 0"
        );
        let result = sqlx::query(&sql)
            .bind(appointment_id.to_string())
            .bind(reader_role.counterpart().to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM appointment_messages")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}
