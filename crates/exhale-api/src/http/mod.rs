//! HTTP/REST API layer for Exhale.
//!
//! Axum-based REST API at `/api/v1/` with bearer-token authentication,
//! envelope response format, CORS support, and a WebSocket realtime channel.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
