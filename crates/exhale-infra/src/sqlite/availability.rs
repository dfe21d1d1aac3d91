//! Read-only SQLite source for coach working hours.
//!
//! The `coach_availability` table is owned and written by the coach-profile
//! service; this core only ever reads it. `day_of_week` is stored as
//! 0 = Monday .. 6 = Sunday (`Weekday::num_days_from_monday`).

use chrono::{NaiveTime, Weekday};
use exhale_core::scheduling::repository::AvailabilitySource;
use exhale_types::availability::AvailabilityWindow;
use exhale_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AvailabilitySource`.
pub struct SqliteAvailabilitySource {
    pool: DatabasePool,
}

impl SqliteAvailabilitySource {
    /// Create a new source backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, RepositoryError> {
    s.parse()
        .map_err(|e| RepositoryError::Query(format!("invalid time '{s}': {e}")))
}

impl AvailabilitySource for SqliteAvailabilitySource {
    async fn windows_for(
        &self,
        coach_id: &Uuid,
        day: Weekday,
    ) -> Result<Vec<AvailabilityWindow>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT start_time, end_time FROM coach_availability
               WHERE coach_id = ? AND day_of_week = ?
               ORDER BY start_time ASC"#,
        )
        .bind(coach_id.to_string())
        .bind(day.num_days_from_monday() as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut windows = Vec::with_capacity(rows.len());
        for row in &rows {
            let start: String = row
                .try_get("start_time")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let end: String = row
                .try_get("end_time")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            windows.push(AvailabilityWindow {
                coach_id: *coach_id,
                day_of_week: day,
                start_time: parse_time(&start)?,
                end_time: parse_time(&end)?,
            });
        }
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn seed_window(pool: &DatabasePool, coach_id: Uuid, day: i64, start: &str, end: &str) {
        sqlx::query(
            "INSERT INTO coach_availability (coach_id, day_of_week, start_time, end_time) VALUES (?, ?, ?, ?)",
        )
        .bind(coach_id.to_string())
        .bind(day)
        .bind(start)
        .bind(end)
        .execute(&pool.writer)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_windows_for_filters_coach_and_day() {
        let pool = test_pool().await;
        let coach = Uuid::now_v7();
        seed_window(&pool, coach, 0, "09:00:00", "17:00:00").await;
        seed_window(&pool, coach, 2, "10:00:00", "14:00:00").await;
        seed_window(&pool, Uuid::now_v7(), 0, "08:00:00", "12:00:00").await;

        let source = SqliteAvailabilitySource::new(pool);
        let monday = source.windows_for(&coach, Weekday::Mon).await.unwrap();
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].start_time, "09:00:00".parse::<NaiveTime>().unwrap());
        assert_eq!(monday[0].day_of_week, Weekday::Mon);

        let tuesday = source.windows_for(&coach, Weekday::Tue).await.unwrap();
        assert!(tuesday.is_empty());

        let wednesday = source.windows_for(&coach, Weekday::Wed).await.unwrap();
        assert_eq!(wednesday.len(), 1);
    }

    #[tokio::test]
    async fn test_split_shift_windows_come_back_ordered() {
        let pool = test_pool().await;
        let coach = Uuid::now_v7();
        seed_window(&pool, coach, 4, "14:00:00", "18:00:00").await;
        seed_window(&pool, coach, 4, "08:00:00", "12:00:00").await;

        let source = SqliteAvailabilitySource::new(pool);
        let friday = source.windows_for(&coach, Weekday::Fri).await.unwrap();
        assert_eq!(friday.len(), 2);
        assert!(friday[0].start_time < friday[1].start_time);
    }
}
