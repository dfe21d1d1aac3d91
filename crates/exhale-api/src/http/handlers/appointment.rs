//! Appointment booking and lifecycle HTTP handlers.
//!
//! Endpoints:
//! - POST  /api/v1/appointments                  - Book an appointment (201 | 409 SlotConflict)
//! - GET   /api/v1/appointments                  - List the caller's appointments
//! - GET   /api/v1/appointments/available-slots  - Free slots for a coach on a date
//! - GET   /api/v1/appointments/{id}             - Get one appointment
//! - PATCH /api/v1/appointments/{id}/status      - confirm / complete
//! - POST  /api/v1/appointments/{id}/cancel      - Cancel (400 on cutoff violation)
//! - POST  /api/v1/appointments/{id}/reschedule  - Close and rebook at a new time
//! - POST  /api/v1/appointments/{id}/rate        - One-time rating after completion

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use exhale_types::appointment::{Appointment, AppointmentStatus};
use exhale_types::availability::Slot;
use exhale_types::identity::Principal;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub coach_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    /// Defaults to the platform slot duration when omitted.
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotsQuery {
    pub coach_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub scheduled_start: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub score: u8,
    pub feedback: Option<String>,
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// POST /api/v1/appointments - Book an appointment.
pub async fn create_appointment(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Appointment>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let duration = req
        .duration_minutes
        .unwrap_or(state.config.slot_duration_minutes);
    let appointment = state
        .appointments
        .create(principal, req.coach_id, req.scheduled_start, duration, req.notes)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointment.clone(), request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{}", appointment.id))
        .with_link(
            "messages",
            &format!("/api/v1/appointments/{}/messages", appointment.id),
        );

    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/appointments - The caller's appointments, newest first.
pub async fn list_appointments(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let appointments = state.appointments.list_owned(principal).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointments, request_id, elapsed)
        .with_link("self", "/api/v1/appointments");
    Ok(Json(resp))
}

/// GET /api/v1/appointments/available-slots?coachId&date - Free slots.
pub async fn available_slots(
    State(state): State<AppState>,
    _principal: Principal,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<ApiResponse<Vec<Slot>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let slots = state
        .appointments
        .resolver()
        .available_slots(&query.coach_id, query.date, state.config.slot_duration_minutes)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(slots, request_id, elapsed)
        .with_link("self", "/api/v1/appointments/available-slots");
    Ok(Json(resp))
}

/// GET /api/v1/appointments/{id} - Get one appointment.
pub async fn get_appointment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let appointment = state.appointments.get_owned(principal, &id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointment, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}"))
        .with_link("messages", &format!("/api/v1/appointments/{id}/messages"));
    Ok(Json(resp))
}

/// PATCH /api/v1/appointments/{id}/status - confirm or complete.
///
/// Cancellation and rescheduling have their own endpoints; requesting any
/// other status here is a validation error.
pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let appointment = match req.status {
        AppointmentStatus::Confirmed => state.appointments.confirm(principal, &id).await?,
        AppointmentStatus::Completed => state.appointments.complete(principal, &id).await?,
        other => {
            return Err(AppError::Validation(format!(
                "status '{other}' cannot be set directly; use the cancel or reschedule endpoint"
            )));
        }
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointment, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}"));
    Ok(Json(resp))
}

/// POST /api/v1/appointments/{id}/cancel - Cancel an appointment.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let appointment = state
        .appointments
        .cancel(principal, &id, req.reason, req.force)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointment, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}"));
    Ok(Json(resp))
}

/// POST /api/v1/appointments/{id}/reschedule - Close and rebook.
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let replacement = state
        .appointments
        .reschedule(principal, &id, req.scheduled_start)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(replacement.clone(), request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{}", replacement.id))
        .with_link("replaces", &format!("/api/v1/appointments/{id}"));
    Ok(Json(resp))
}

/// POST /api/v1/appointments/{id}/rate - Rate a completed appointment.
pub async fn rate_appointment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<RateRequest>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let appointment = state
        .appointments
        .rate(principal, &id, req.score, req.feedback)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(appointment, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}"));
    Ok(Json(resp))
}
