//! Message Store service: validated sends, ordered reads, read receipts.
//!
//! The server-persisted log is the sole source of truth for a conversation;
//! any client cache is a transient view. Ids are assigned here (through the
//! repository), never accepted from clients.

use chrono::Utc;
use exhale_types::appointment::Appointment;
use exhale_types::config::PlatformConfig;
use exhale_types::error::MessageError;
use exhale_types::identity::{Principal, Role};
use exhale_types::message::AppointmentMessage;
use tracing::info;
use uuid::Uuid;

use crate::scheduling::repository::AppointmentRepository;

use super::repository::MessageRepository;

/// Orchestrates message persistence and read receipts for one deployment.
///
/// Generic over the message and appointment repositories; the appointment
/// repository is only consulted for party authorization.
pub struct MessageService<M: MessageRepository, A: AppointmentRepository> {
    messages: M,
    appointments: A,
    max_chars: usize,
}

impl<M: MessageRepository, A: AppointmentRepository> MessageService<M, A> {
    pub fn new(messages: M, appointments: A, config: &PlatformConfig) -> Self {
        Self {
            messages,
            appointments,
            max_chars: config.max_message_chars,
        }
    }

    /// Access the message repository.
    pub fn message_repo(&self) -> &M {
        &self.messages
    }

    /// Persist a message from the calling party.
    ///
    /// Rejects empty text and text beyond the configured length bound before
    /// any write. The returned message carries the server-assigned id.
    pub async fn send(
        &self,
        principal: Principal,
        appointment_id: &Uuid,
        text: &str,
    ) -> Result<AppointmentMessage, MessageError> {
        if text.is_empty() {
            return Err(MessageError::Validation(
                "message text is empty".to_string(),
            ));
        }
        let chars = text.chars().count();
        if chars > self.max_chars {
            return Err(MessageError::Validation(format!(
                "message text is {chars} characters, limit is {}",
                self.max_chars
            )));
        }
        self.authorize(principal, appointment_id).await?;

        let message = self
            .messages
            .append(appointment_id, principal.role, text, Utc::now())
            .await?;
        info!(appointment_id = %appointment_id, message_id = message.id, "Message stored");
        Ok(message)
    }

    /// Full ordered conversation log, visible to parties only.
    pub async fn list(
        &self,
        principal: Principal,
        appointment_id: &Uuid,
    ) -> Result<Vec<AppointmentMessage>, MessageError> {
        self.authorize(principal, appointment_id).await?;
        Ok(self.messages.list(appointment_id).await?)
    }

    /// Mark the counterpart's messages as read by the caller. Idempotent.
    pub async fn mark_read(
        &self,
        principal: Principal,
        appointment_id: &Uuid,
    ) -> Result<(), MessageError> {
        self.authorize(principal, appointment_id).await?;
        let changed = self
            .messages
            .mark_read(appointment_id, principal.role)
            .await?;
        if changed > 0 {
            info!(appointment_id = %appointment_id, changed, "Messages marked read");
        }
        Ok(())
    }

    /// A principal may only touch conversations of appointments where they
    /// are the party matching their role. Anything else looks like a missing
    /// appointment.
    async fn authorize(
        &self,
        principal: Principal,
        appointment_id: &Uuid,
    ) -> Result<Appointment, MessageError> {
        let appointment = self
            .appointments
            .get(appointment_id)
            .await
            .map_err(|e| MessageError::Storage(e.to_string()))?
            .ok_or(MessageError::NotFound)?;
        let matches_party = match principal.role {
            Role::Participant => appointment.participant_id == principal.id,
            Role::Coach => appointment.coach_id == principal.id,
        };
        if !matches_party {
            return Err(MessageError::NotFound);
        }
        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::repository::AppointmentRepository;
    use crate::scheduling::testing::InMemoryAppointmentRepository;
    use chrono::DateTime;
    use exhale_types::appointment::AppointmentStatus;
    use exhale_types::error::RepositoryError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory message log with the SQLite implementation's semantics:
    /// per-appointment monotonic ids, monotonic read flags.
    #[derive(Clone, Default)]
    struct InMemoryMessageRepository {
        inner: Arc<Mutex<HashMap<Uuid, Vec<AppointmentMessage>>>>,
    }

    impl MessageRepository for InMemoryMessageRepository {
        async fn append(
            &self,
            appointment_id: &Uuid,
            sender_role: Role,
            text: &str,
            created_at: DateTime<Utc>,
        ) -> Result<AppointmentMessage, RepositoryError> {
            let mut map = self.inner.lock().unwrap();
            let log = map.entry(*appointment_id).or_default();
            let next_id = log.last().map(|m| m.id + 1).unwrap_or(1);
            let message = AppointmentMessage {
                id: next_id,
                appointment_id: *appointment_id,
                sender_role,
                text: text.to_string(),
                created_at,
                read_by_participant: sender_role == Role::Participant,
                read_by_coach: sender_role == Role::Coach,
            };
            log.push(message.clone());
            Ok(message)
        }

        async fn list(
            &self,
            appointment_id: &Uuid,
        ) -> Result<Vec<AppointmentMessage>, RepositoryError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .get(appointment_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn mark_read(
            &self,
            appointment_id: &Uuid,
            reader_role: Role,
        ) -> Result<u64, RepositoryError> {
            let mut map = self.inner.lock().unwrap();
            let mut changed = 0;
            if let Some(log) = map.get_mut(appointment_id) {
                for m in log.iter_mut().filter(|m| m.sender_role != reader_role) {
                    let flag = match reader_role {
                        Role::Participant => &mut m.read_by_participant,
                        Role::Coach => &mut m.read_by_coach,
                    };
                    if !*flag {
                        *flag = true;
                        changed += 1;
                    }
                }
            }
            Ok(changed)
        }

        async fn count_messages(&self) -> Result<u64, RepositoryError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .values()
                .map(|log| log.len() as u64)
                .sum())
        }
    }

    struct Fixture {
        service: MessageService<InMemoryMessageRepository, InMemoryAppointmentRepository>,
        appointment_id: Uuid,
        participant: Principal,
        coach: Principal,
    }

    async fn fixture() -> Fixture {
        let appointments = InMemoryAppointmentRepository::new();
        let participant = Principal::new(Uuid::now_v7(), Role::Participant);
        let coach = Principal::new(Uuid::now_v7(), Role::Coach);
        let appointment = exhale_types::appointment::Appointment {
            id: Uuid::now_v7(),
            participant_id: participant.id,
            coach_id: coach.id,
            scheduled_start: Utc::now() + chrono::Duration::days(3),
            duration_minutes: 120,
            status: AppointmentStatus::Confirmed,
            notes: None,
            rating: None,
            history: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        appointments.insert_booking(&appointment).await.unwrap();
        let service = MessageService::new(
            InMemoryMessageRepository::default(),
            appointments,
            &PlatformConfig::default(),
        );
        Fixture {
            service,
            appointment_id: appointment.id,
            participant,
            coach,
        }
    }

    #[tokio::test]
    async fn send_assigns_strictly_increasing_ids() {
        let f = fixture().await;
        for i in 0..5 {
            f.service
                .send(f.participant, &f.appointment_id, &format!("update {i}"))
                .await
                .unwrap();
        }
        let log = f.service.list(f.participant, &f.appointment_id).await.unwrap();
        let ids: Vec<i64> = log.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn send_sets_sender_flag_only() {
        let f = fixture().await;
        let msg = f
            .service
            .send(f.coach, &f.appointment_id, "how was the week?")
            .await
            .unwrap();
        assert!(msg.read_by_coach);
        assert!(!msg.read_by_participant);
    }

    #[tokio::test]
    async fn empty_and_oversized_text_rejected_without_write() {
        let f = fixture().await;
        let err = f
            .service
            .send(f.participant, &f.appointment_id, "")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Validation(_)));

        let long = "x".repeat(PlatformConfig::default().max_message_chars + 1);
        let err = f
            .service
            .send(f.participant, &f.appointment_id, &long)
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Validation(_)));

        let log = f.service.list(f.participant, &f.appointment_id).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let f = fixture().await;
        f.service
            .send(f.participant, &f.appointment_id, "checking in")
            .await
            .unwrap();
        f.service
            .send(f.coach, &f.appointment_id, "proud of you")
            .await
            .unwrap();

        f.service.mark_read(f.coach, &f.appointment_id).await.unwrap();
        let after_first = f.service.list(f.coach, &f.appointment_id).await.unwrap();

        f.service.mark_read(f.coach, &f.appointment_id).await.unwrap();
        let after_second = f.service.list(f.coach, &f.appointment_id).await.unwrap();

        assert_eq!(after_first, after_second);
        // The participant's message is now read by both; the coach's own
        // message is untouched.
        assert!(after_second[0].read_by_coach);
        assert!(!after_second[1].read_by_participant);
    }

    #[tokio::test]
    async fn strangers_see_not_found() {
        let f = fixture().await;
        let stranger = Principal::new(Uuid::now_v7(), Role::Participant);
        let err = f
            .service
            .send(stranger, &f.appointment_id, "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::NotFound));

        let err = f.service.list(stranger, &f.appointment_id).await.unwrap_err();
        assert!(matches!(err, MessageError::NotFound));
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .send(f.participant, &Uuid::now_v7(), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::NotFound));
    }
}
