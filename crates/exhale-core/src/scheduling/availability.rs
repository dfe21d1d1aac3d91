//! Availability Resolver: free slots for a coach on a date.
//!
//! Slots step through each working-hours window from its start, in fixed
//! increments of the requested duration. A slot survives only if it lies
//! fully inside the window and its half-open interval does not intersect any
//! pending/confirmed appointment of the coach. Time-zone and DST
//! normalization is the caller's responsibility: dates and wall-clock window
//! times are interpreted as UTC.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use exhale_types::availability::Slot;
use exhale_types::error::SchedulingError;
use uuid::Uuid;

use super::repository::{AppointmentRepository, AvailabilitySource};

/// Computes bookable slots from working hours minus existing bookings.
pub struct AvailabilityResolver<R: AppointmentRepository, W: AvailabilitySource> {
    appointments: R,
    windows: W,
}

impl<R: AppointmentRepository, W: AvailabilitySource> AvailabilityResolver<R, W> {
    pub fn new(appointments: R, windows: W) -> Self {
        Self {
            appointments,
            windows,
        }
    }

    /// Free slots for a coach on a calendar day, earliest first.
    ///
    /// Dates strictly before today (UTC) are rejected with a validation
    /// error; durations of zero minutes likewise.
    pub async fn available_slots(
        &self,
        coach_id: &Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<Slot>, SchedulingError> {
        self.slots_with_today(coach_id, date, duration_minutes, Utc::now().date_naive())
            .await
    }

    /// Candidate grid starts for one day, ignoring existing bookings.
    ///
    /// Used by the lifecycle manager to re-validate a requested start at
    /// commit time: conflicts are the repository transaction's concern, but
    /// the start must still land on the offered grid.
    pub async fn grid_starts(
        &self,
        coach_id: &Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<chrono::DateTime<Utc>>, SchedulingError> {
        if duration_minutes == 0 {
            return Err(SchedulingError::Validation(
                "slot duration must be positive".to_string(),
            ));
        }
        let windows = self.windows.windows_for(coach_id, date.weekday()).await?;
        let step = Duration::minutes(duration_minutes as i64);

        let mut starts = Vec::new();
        for window in &windows {
            let window_end = date.and_time(window.end_time).and_utc();
            let mut start = date.and_time(window.start_time).and_utc();
            while start + step <= window_end {
                starts.push(start);
                start += step;
            }
        }
        starts.sort();
        starts.dedup();
        Ok(starts)
    }

    pub(crate) async fn slots_with_today(
        &self,
        coach_id: &Uuid,
        date: NaiveDate,
        duration_minutes: u32,
        today: NaiveDate,
    ) -> Result<Vec<Slot>, SchedulingError> {
        if date < today {
            return Err(SchedulingError::Validation(format!(
                "date {date} is in the past"
            )));
        }

        let starts = self.grid_starts(coach_id, date, duration_minutes).await?;
        if starts.is_empty() {
            return Ok(Vec::new());
        }

        // One fetch covers the whole day; overlap tests run per slot.
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);
        let booked = self
            .appointments
            .active_for_coach_between(coach_id, day_start, day_end)
            .await?;

        let step = Duration::minutes(duration_minutes as i64);
        let slots = starts
            .into_iter()
            .filter(|start| !booked.iter().any(|a| a.overlaps(*start, *start + step)))
            .map(|start| Slot {
                start,
                duration_minutes,
            })
            .collect();
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::testing::{InMemoryAppointmentRepository, InMemoryAvailabilitySource};
    use chrono::{DateTime, NaiveDate, TimeZone, Weekday};
    use exhale_types::appointment::{Appointment, AppointmentStatus};
    use exhale_types::availability::AvailabilityWindow;

    fn window(coach_id: Uuid, day: Weekday, start: &str, end: &str) -> AvailabilityWindow {
        AvailabilityWindow {
            coach_id,
            day_of_week: day,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
        }
    }

    fn booking(coach_id: Uuid, start: DateTime<Utc>, minutes: u32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::now_v7(),
            participant_id: Uuid::now_v7(),
            coach_id,
            scheduled_start: start,
            duration_minutes: minutes,
            status,
            notes: None,
            rating: None,
            history: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // Monday 2026-03-02, a date with no DST edge in UTC.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn empty_resolver(
        coach_id: Uuid,
    ) -> AvailabilityResolver<InMemoryAppointmentRepository, InMemoryAvailabilitySource> {
        let windows = InMemoryAvailabilitySource::new(vec![window(
            coach_id,
            Weekday::Mon,
            "09:00:00",
            "17:00:00",
        )]);
        AvailabilityResolver::new(InMemoryAppointmentRepository::new(), windows)
    }

    #[tokio::test]
    async fn working_day_minus_one_booking_yields_three_slots() {
        let coach = Uuid::now_v7();
        let booked_at = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
        let repo = InMemoryAppointmentRepository::new();
        repo.insert_booking(&booking(coach, booked_at, 120, AppointmentStatus::Confirmed))
            .await
            .unwrap();
        let windows = InMemoryAvailabilitySource::new(vec![window(
            coach,
            Weekday::Mon,
            "09:00:00",
            "17:00:00",
        )]);
        let resolver = AvailabilityResolver::new(repo, windows);

        let slots = resolver
            .slots_with_today(&coach, monday(), 120, monday())
            .await
            .unwrap();

        let starts: Vec<u32> = slots
            .iter()
            .map(|s| s.start.format("%H%M").to_string().parse().unwrap())
            .collect();
        assert_eq!(starts, vec![900, 1100, 1500]);
    }

    #[tokio::test]
    async fn cancelled_bookings_do_not_block_slots() {
        let coach = Uuid::now_v7();
        let booked_at = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
        let repo = InMemoryAppointmentRepository::new();
        let mut cancelled = booking(coach, booked_at, 120, AppointmentStatus::Pending);
        repo.insert_booking(&cancelled).await.unwrap();
        cancelled.status = AppointmentStatus::Cancelled;
        repo.update(&cancelled).await.unwrap();

        let windows = InMemoryAvailabilitySource::new(vec![window(
            coach,
            Weekday::Mon,
            "09:00:00",
            "17:00:00",
        )]);
        let resolver = AvailabilityResolver::new(repo, windows);

        let slots = resolver
            .slots_with_today(&coach, monday(), 120, monday())
            .await
            .unwrap();
        assert_eq!(slots.len(), 4);
    }

    #[tokio::test]
    async fn no_slot_overlaps_an_active_booking() {
        let coach = Uuid::now_v7();
        let repo = InMemoryAppointmentRepository::new();
        // Off-grid 90-minute booking at 10:30 shadows the 09:00 and 11:00 slots.
        let booked_at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();
        repo.insert_booking(&booking(coach, booked_at, 90, AppointmentStatus::Pending))
            .await
            .unwrap();
        let windows = InMemoryAvailabilitySource::new(vec![window(
            coach,
            Weekday::Mon,
            "09:00:00",
            "17:00:00",
        )]);
        let resolver = AvailabilityResolver::new(repo.clone(), windows);

        let slots = resolver
            .slots_with_today(&coach, monday(), 120, monday())
            .await
            .unwrap();

        let booked = repo
            .active_for_coach_between(
                &coach,
                Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        for slot in &slots {
            assert!(
                !booked.iter().any(|a| a.overlaps(slot.start, slot.end())),
                "slot {} overlaps a booking",
                slot.start
            );
        }
        let starts: Vec<u32> = slots
            .iter()
            .map(|s| s.start.format("%H%M").to_string().parse().unwrap())
            .collect();
        assert_eq!(starts, vec![1300, 1500]);
    }

    #[tokio::test]
    async fn past_dates_are_rejected() {
        let coach = Uuid::now_v7();
        let resolver = empty_resolver(coach);
        let yesterday = monday().pred_opt().unwrap();

        let err = resolver
            .slots_with_today(&coach, yesterday, 120, monday())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }

    #[tokio::test]
    async fn day_without_windows_is_empty() {
        let coach = Uuid::now_v7();
        let resolver = empty_resolver(coach);
        // 2026-03-03 is a Tuesday; the only window is on Monday.
        let tuesday = monday().succ_opt().unwrap();

        let slots = resolver
            .slots_with_today(&coach, tuesday, 120, monday())
            .await
            .unwrap();
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn slot_must_fit_inside_the_window() {
        let coach = Uuid::now_v7();
        let repo = InMemoryAppointmentRepository::new();
        // 09:00-12:00 fits one 120-minute slot; the 11:00 start would spill over.
        let windows = InMemoryAvailabilitySource::new(vec![window(
            coach,
            Weekday::Mon,
            "09:00:00",
            "12:00:00",
        )]);
        let resolver = AvailabilityResolver::new(repo, windows);

        let slots = resolver
            .slots_with_today(&coach, monday(), 120, monday())
            .await
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start.format("%H:%M").to_string(), "09:00");
    }

    #[tokio::test]
    async fn zero_duration_is_rejected() {
        let coach = Uuid::now_v7();
        let resolver = empty_resolver(coach);
        let err = resolver
            .slots_with_today(&coach, monday(), 0, monday())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }
}
