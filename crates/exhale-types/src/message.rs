//! Per-appointment conversation message types.
//!
//! Messages are append-only: after creation only the read flags may change,
//! and those are monotonic (false to true only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export Role from the identity module (the sender of a message is always
// one of the two appointment parties).
pub use crate::identity::Role;

/// A single message in an appointment's conversation log.
///
/// `id` is monotonic per appointment and assigned by the store at insert
/// time, never by the client. Total order is `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentMessage {
    pub id: i64,
    pub appointment_id: Uuid,
    pub sender_role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub read_by_participant: bool,
    pub read_by_coach: bool,
}

impl AppointmentMessage {
    /// Read flag for the given role.
    pub fn read_by(&self, role: Role) -> bool {
        match role {
            Role::Participant => self.read_by_participant,
            Role::Coach => self.read_by_coach,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(seq: i64, sender: Role) -> AppointmentMessage {
        AppointmentMessage {
            id: seq,
            appointment_id: Uuid::now_v7(),
            sender_role: sender,
            text: "day three without a cigarette".to_string(),
            created_at: Utc::now(),
            read_by_participant: sender == Role::Participant,
            read_by_coach: sender == Role::Coach,
        }
    }

    #[test]
    fn test_sender_reads_own_message() {
        let msg = make_message(1, Role::Participant);
        assert!(msg.read_by(Role::Participant));
        assert!(!msg.read_by(Role::Coach));
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = make_message(7, Role::Coach);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"appointmentId\""));
        assert!(json.contains("\"senderRole\":\"coach\""));
        assert!(json.contains("\"readByCoach\":true"));
        assert!(json.contains("\"readByParticipant\":false"));
    }
}
