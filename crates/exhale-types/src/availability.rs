//! Coach working hours and bookable slots.
//!
//! `AvailabilityWindow` is read-only input owned by the coach-profile
//! collaborator. Times are wall-clock in the coach's canonical zone;
//! time-zone and DST normalization is the caller's responsibility.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recurring weekly working-hours window for a coach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub coach_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A candidate fixed-duration window offered for booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl Slot {
    /// Exclusive end of the slot.
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}
