//! Appointment Lifecycle Manager: booking and the status state machine.
//!
//! ```text
//! pending --confirm(coach)--> confirmed --complete(coach)--> completed
//! pending --cancel(any,reason)--> cancelled
//! confirmed --cancel(any,reason)--> cancelled   (blocked inside the cutoff unless the coach forces)
//! pending/confirmed --reschedule(new time)--> rescheduled (closes old record, opens a new pending one)
//! ```
//!
//! `create` re-validates against availability at commit time: the grid check
//! runs here, and the overlap check runs inside the repository's insert
//! transaction, so a losing concurrent booking gets `SlotConflict` and writes
//! nothing. Every transition appends exactly one history entry; nothing is
//! retried automatically -- the caller re-issues on conflict.

use chrono::{DateTime, Duration, Utc};
use exhale_types::appointment::{Appointment, AppointmentStatus, HistoryAction};
use exhale_types::appointment::Rating;
use exhale_types::config::PlatformConfig;
use exhale_types::error::SchedulingError;
use exhale_types::identity::{Principal, Role};
use tracing::{info, warn};
use uuid::Uuid;

use super::availability::AvailabilityResolver;
use super::repository::{AppointmentRepository, AvailabilitySource};

/// Orchestrates booking, status transitions, and rating.
///
/// Generic over the repository and availability ports so exhale-core never
/// depends on exhale-infra.
pub struct AppointmentService<R: AppointmentRepository, W: AvailabilitySource> {
    repo: R,
    resolver: AvailabilityResolver<R, W>,
    config: PlatformConfig,
}

impl<R: AppointmentRepository + Clone, W: AvailabilitySource> AppointmentService<R, W> {
    pub fn new(repo: R, windows: W, config: PlatformConfig) -> Self {
        let resolver = AvailabilityResolver::new(repo.clone(), windows);
        Self {
            repo,
            resolver,
            config,
        }
    }
}

impl<R: AppointmentRepository, W: AvailabilitySource> AppointmentService<R, W> {
    /// Access the availability resolver (slot listing endpoint).
    pub fn resolver(&self) -> &AvailabilityResolver<R, W> {
        &self.resolver
    }

    /// Book a new appointment for the calling participant.
    ///
    /// Validates the start against the coach's slot grid, applies the
    /// late-cancel rebook policy, then hands the conflict check to the
    /// repository transaction. A conflicting concurrent booking surfaces as
    /// `SlotConflict`; the caller must re-query availability and re-issue.
    pub async fn create(
        &self,
        principal: Principal,
        coach_id: Uuid,
        scheduled_start: DateTime<Utc>,
        duration_minutes: u32,
        notes: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        if principal.role != Role::Participant {
            return Err(SchedulingError::Forbidden(
                "only participants can book appointments".to_string(),
            ));
        }
        let now = Utc::now();
        if scheduled_start <= now {
            return Err(SchedulingError::Validation(
                "scheduled start must be in the future".to_string(),
            ));
        }
        self.check_on_grid(&coach_id, scheduled_start, duration_minutes)
            .await?;
        self.check_rebook_policy(&principal, now).await?;

        let mut appointment = Appointment {
            id: Uuid::now_v7(),
            participant_id: principal.id,
            coach_id,
            scheduled_start,
            duration_minutes,
            status: AppointmentStatus::Pending,
            notes,
            rating: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        appointment.record(HistoryAction::Booked, principal.id, None);

        self.repo.insert_booking(&appointment).await?;
        info!(appointment_id = %appointment.id, coach_id = %coach_id, "Appointment booked");
        Ok(appointment)
    }

    /// Get an appointment visible to the caller.
    ///
    /// Appointments not owned by the caller are indistinguishable from
    /// missing ones.
    pub async fn get_owned(
        &self,
        principal: Principal,
        id: &Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .repo
            .get(id)
            .await?
            .ok_or(SchedulingError::NotFound)?;
        if !appointment.is_party(principal.id) {
            return Err(SchedulingError::NotFound);
        }
        Ok(appointment)
    }

    /// All appointments the caller is a party to, newest first.
    pub async fn list_owned(
        &self,
        principal: Principal,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.repo.list_for_principal(&principal.id).await?)
    }

    /// pending -> confirmed. Only the assigned coach.
    pub async fn confirm(
        &self,
        principal: Principal,
        id: &Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_owned(principal, id).await?;
        self.require_coach(&principal, &appointment)?;
        if appointment.status != AppointmentStatus::Pending {
            return Err(SchedulingError::StaleState(format!(
                "cannot confirm a {} appointment",
                appointment.status
            )));
        }
        appointment.status = AppointmentStatus::Confirmed;
        appointment.record(HistoryAction::Confirmed, principal.id, None);
        self.repo.update(&appointment).await?;
        info!(appointment_id = %id, "Appointment confirmed");
        Ok(appointment)
    }

    /// confirmed -> completed. Only the assigned coach.
    pub async fn complete(
        &self,
        principal: Principal,
        id: &Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_owned(principal, id).await?;
        self.require_coach(&principal, &appointment)?;
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(SchedulingError::StaleState(format!(
                "cannot complete a {} appointment",
                appointment.status
            )));
        }
        appointment.status = AppointmentStatus::Completed;
        appointment.record(HistoryAction::Completed, principal.id, None);
        self.repo.update(&appointment).await?;
        info!(appointment_id = %id, "Appointment completed");
        Ok(appointment)
    }

    /// pending/confirmed -> cancelled, by either party.
    ///
    /// Cancelling a confirmed appointment inside the cutoff window is
    /// rejected; the assigned coach may force past it, a participant never
    /// can.
    pub async fn cancel(
        &self,
        principal: Principal,
        id: &Uuid,
        reason: Option<String>,
        force: bool,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_owned(principal, id).await?;
        if !appointment.status.is_active() {
            return Err(SchedulingError::StaleState(format!(
                "cannot cancel a {} appointment",
                appointment.status
            )));
        }

        if appointment.status == AppointmentStatus::Confirmed {
            let cutoff_hours = self.config.cancellation_cutoff_hours;
            let cutoff = appointment.scheduled_start - Duration::hours(cutoff_hours);
            let coach_forced = force && principal.id == appointment.coach_id;
            if Utc::now() > cutoff && !coach_forced {
                return Err(SchedulingError::CutoffViolation {
                    hours: cutoff_hours,
                });
            }
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.record(HistoryAction::Cancelled, principal.id, reason);
        self.repo.update(&appointment).await?;
        info!(appointment_id = %id, "Appointment cancelled");
        Ok(appointment)
    }

    /// pending/confirmed -> rescheduled: closes the old record and opens a
    /// new pending one at the new time, linked through both histories.
    ///
    /// Returns the replacement appointment.
    pub async fn reschedule(
        &self,
        principal: Principal,
        id: &Uuid,
        new_start: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let mut closed = self.get_owned(principal, id).await?;
        if !closed.status.is_active() {
            return Err(SchedulingError::StaleState(format!(
                "cannot reschedule a {} appointment",
                closed.status
            )));
        }
        let now = Utc::now();
        if new_start <= now {
            return Err(SchedulingError::Validation(
                "scheduled start must be in the future".to_string(),
            ));
        }
        self.check_on_grid(&closed.coach_id, new_start, closed.duration_minutes)
            .await?;

        let mut replacement = Appointment {
            id: Uuid::now_v7(),
            participant_id: closed.participant_id,
            coach_id: closed.coach_id,
            scheduled_start: new_start,
            duration_minutes: closed.duration_minutes,
            status: AppointmentStatus::Pending,
            notes: closed.notes.clone(),
            rating: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        replacement.record(
            HistoryAction::Booked,
            principal.id,
            Some(format!("rescheduled from {}", closed.id)),
        );

        closed.status = AppointmentStatus::Rescheduled;
        closed.record(
            HistoryAction::Rescheduled,
            principal.id,
            Some(format!("rescheduled to {}", replacement.id)),
        );

        self.repo.reschedule(&closed, &replacement).await?;
        info!(old = %closed.id, new = %replacement.id, "Appointment rescheduled");
        Ok(replacement)
    }

    /// Rate a completed appointment, once, by the participant.
    pub async fn rate(
        &self,
        principal: Principal,
        id: &Uuid,
        score: u8,
        feedback: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_owned(principal, id).await?;
        if principal.id != appointment.participant_id {
            return Err(SchedulingError::Forbidden(
                "only the participant can rate an appointment".to_string(),
            ));
        }
        if !(1..=5).contains(&score) {
            return Err(SchedulingError::Validation(format!(
                "rating score must be between 1 and 5, got {score}"
            )));
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(SchedulingError::StaleState(format!(
                "cannot rate a {} appointment",
                appointment.status
            )));
        }
        if appointment.rating.is_some() {
            return Err(SchedulingError::StaleState(
                "appointment already rated".to_string(),
            ));
        }

        appointment.rating = Some(Rating {
            score,
            feedback,
            rated_at: Utc::now(),
        });
        appointment.record(HistoryAction::Rated, principal.id, Some(score.to_string()));
        self.repo.update(&appointment).await?;
        info!(appointment_id = %id, score, "Appointment rated");
        Ok(appointment)
    }

    fn require_coach(
        &self,
        principal: &Principal,
        appointment: &Appointment,
    ) -> Result<(), SchedulingError> {
        if principal.role != Role::Coach || principal.id != appointment.coach_id {
            return Err(SchedulingError::Forbidden(
                "only the assigned coach may perform this transition".to_string(),
            ));
        }
        Ok(())
    }

    /// The requested start must be one of the starts the resolver would
    /// offer for that day, conflicts aside.
    async fn check_on_grid(
        &self,
        coach_id: &Uuid,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), SchedulingError> {
        let grid = self
            .resolver
            .grid_starts(coach_id, start.date_naive(), duration_minutes)
            .await?;
        if !grid.contains(&start) {
            return Err(SchedulingError::Validation(
                "requested start is outside the coach's bookable slots".to_string(),
            ));
        }
        Ok(())
    }

    /// When disallowed by policy, a participant holding a future-dated
    /// appointment they self-cancelled inside the cutoff window cannot book.
    async fn check_rebook_policy(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        if self.config.allow_rebook_after_late_cancel {
            return Ok(());
        }
        let cutoff = Duration::hours(self.config.cancellation_cutoff_hours);
        let cancelled = self
            .repo
            .cancelled_for_participant_after(&principal.id, now)
            .await?;
        let blocked = cancelled.iter().any(|a| {
            a.history.iter().any(|h| {
                h.action == HistoryAction::Cancelled
                    && h.actor == principal.id
                    && h.timestamp > a.scheduled_start - cutoff
            })
        });
        if blocked {
            warn!(participant_id = %principal.id, "Rebook blocked by late-cancel policy");
            return Err(SchedulingError::Forbidden(
                "rebooking is blocked after a late cancellation".to_string(),
            ));
        }
        Ok(())
    }
}
