//! Conversation message HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/appointments/{id}/messages      - Full ordered log
//! - POST /api/v1/appointments/{id}/messages      - Persist a message (201)
//! - POST /api/v1/appointments/{id}/messages/read - Mark counterpart messages read
//!
//! Room notifications are published only after the persistence write
//! commits, so a client can never observe a hint for data it cannot yet
//! read back. The publish itself is best-effort: a dropped signal is
//! compensated by the clients' polling path, never surfaced to the caller.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use exhale_types::identity::Principal;
use exhale_types::message::AppointmentMessage;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// GET /api/v1/appointments/{id}/messages - Ordered conversation log.
pub async fn list_messages(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AppointmentMessage>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let messages = state.messages.list(principal, &id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(messages, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}/messages"))
        .with_link("appointment", &format!("/api/v1/appointments/{id}"));
    Ok(Json(resp))
}

/// POST /api/v1/appointments/{id}/messages - Persist a message.
pub async fn send_message(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentMessage>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    let message = state.messages.send(principal, &id, &req.text).await?;

    // The write is committed; room members may now re-fetch.
    state.rooms.notify_new_message(id, None);

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(message, request_id, elapsed)
        .with_link("self", &format!("/api/v1/appointments/{id}/messages"));
    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /api/v1/appointments/{id}/messages/read - Read receipt.
pub async fn mark_messages_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&id)?;

    state.messages.mark_read(principal, &id).await?;

    state.rooms.notify_read(id, principal.role, None);

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        serde_json::json!({"read": true, "appointmentId": id}),
        request_id,
        elapsed,
    );
    Ok(Json(resp))
}
