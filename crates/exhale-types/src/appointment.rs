//! Appointment, status lifecycle, history, and rating types for Exhale.
//!
//! An appointment is never deleted: cancellation and rescheduling are
//! statuses, and every transition appends one entry to the append-only
//! history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an appointment.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled', 'rescheduled'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    /// Whether this status holds the slot against other bookings.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "rescheduled" => Ok(AppointmentStatus::Rescheduled),
            other => Err(format!("invalid appointment status: '{other}'")),
        }
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Pending
    }
}

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Booked,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    Rated,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryAction::Booked => write!(f, "booked"),
            HistoryAction::Confirmed => write!(f, "confirmed"),
            HistoryAction::Completed => write!(f, "completed"),
            HistoryAction::Cancelled => write!(f, "cancelled"),
            HistoryAction::Rescheduled => write!(f, "rescheduled"),
            HistoryAction::Rated => write!(f, "rated"),
        }
    }
}

/// One entry in an appointment's append-only history.
///
/// `detail` carries the cancellation reason, or the id of the replacement
/// appointment on a reschedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
    pub actor: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// A one-time rating left by the participant after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub score: u8,
    pub feedback: Option<String>,
    pub rated_at: DateTime<Utc>,
}

/// A booked coaching session between a participant and a coach.
///
/// Wire fields are camelCase for the platform's JS clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub coach_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub rating: Option<Rating>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Exclusive end of the booked window.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_start + Duration::minutes(self.duration_minutes as i64)
    }

    /// Half-open interval intersection against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_start < end && start < self.scheduled_end()
    }

    /// Whether the given principal id is the participant or the coach.
    pub fn is_party(&self, principal_id: Uuid) -> bool {
        self.participant_id == principal_id || self.coach_id == principal_id
    }

    /// Append a history entry. History is append-only, never mutated.
    pub fn record(&mut self, action: HistoryAction, actor: Uuid, detail: Option<String>) {
        self.history.push(HistoryEntry {
            action,
            timestamp: Utc::now(),
            actor,
            detail,
        });
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_appointment(start: DateTime<Utc>, minutes: u32) -> Appointment {
        Appointment {
            id: Uuid::now_v7(),
            participant_id: Uuid::now_v7(),
            coach_id: Uuid::now_v7(),
            scheduled_start: start,
            duration_minutes: minutes,
            status: AppointmentStatus::Pending,
            notes: None,
            rating: None,
            history: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rescheduled,
        ] {
            let s = status.to_string();
            let parsed: AppointmentStatus = s.parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&AppointmentStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn test_active_statuses_hold_the_slot() {
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Confirmed.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(!AppointmentStatus::Rescheduled.is_active());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
        let appt = make_appointment(start, 120);

        // Touching intervals do not overlap
        let before = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        assert!(!appt.overlaps(before, start));
        let end = appt.scheduled_end();
        let after = Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap();
        assert!(!appt.overlaps(end, after));

        // One minute of intersection does
        let late = Utc.with_ymd_and_hms(2026, 3, 2, 14, 59, 0).unwrap();
        assert!(appt.overlaps(late, late + Duration::minutes(120)));
    }

    #[test]
    fn test_record_appends_history() {
        let mut appt = make_appointment(Utc::now(), 60);
        let coach = appt.coach_id;
        appt.record(HistoryAction::Confirmed, coach, None);
        appt.record(HistoryAction::Cancelled, coach, Some("sick".to_string()));

        assert_eq!(appt.history.len(), 2);
        assert_eq!(appt.history[0].action, HistoryAction::Confirmed);
        assert_eq!(appt.history[1].detail.as_deref(), Some("sick"));
    }

    #[test]
    fn test_appointment_serializes_camel_case() {
        let appt = make_appointment(Utc::now(), 120);
        let json = serde_json::to_string(&appt).unwrap();
        assert!(json.contains("\"scheduledStart\""));
        assert!(json.contains("\"durationMinutes\""));
        assert!(json.contains("\"status\":\"pending\""));
    }
}
