//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Notifier delivery failures never appear here: dropped push events are
//! swallowed at the registry and compensated by the clients' polling path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use exhale_types::error::{MessageError, SchedulingError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Booking and lifecycle errors.
    Scheduling(SchedulingError),
    /// Message store errors.
    Message(MessageError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error raised at the HTTP boundary.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        AppError::Scheduling(e)
    }
}

impl From<MessageError> for AppError {
    fn from(e: MessageError) -> Self {
        AppError::Message(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Scheduling(SchedulingError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Appointment not found".to_string())
            }
            AppError::Scheduling(SchedulingError::SlotConflict) => (
                StatusCode::CONFLICT,
                "SLOT_CONFLICT",
                "Requested slot conflicts with an existing booking".to_string(),
            ),
            AppError::Scheduling(SchedulingError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Scheduling(SchedulingError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AppError::Scheduling(SchedulingError::StaleState(msg)) => {
                (StatusCode::BAD_REQUEST, "STALE_STATE", msg.clone())
            }
            AppError::Scheduling(e @ SchedulingError::CutoffViolation { .. }) => {
                (StatusCode::BAD_REQUEST, "CUTOFF_VIOLATION", e.to_string())
            }
            AppError::Scheduling(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SCHEDULING_ERROR", e.to_string())
            }
            AppError::Message(MessageError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Appointment not found".to_string())
            }
            AppError::Message(MessageError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Message(MessageError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AppError::Message(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MESSAGE_ERROR", e.to_string())
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
