//! Axum router configuration with middleware.
//!
//! All REST routes are under `/api/v1/`; the realtime channel is at `/ws`.
//! Middleware: CORS, tracing.

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Booking
        .route(
            "/appointments",
            post(handlers::appointment::create_appointment)
                .get(handlers::appointment::list_appointments),
        )
        .route(
            "/appointments/available-slots",
            get(handlers::appointment::available_slots),
        )
        .route(
            "/appointments/{id}",
            get(handlers::appointment::get_appointment),
        )
        // Lifecycle transitions
        .route(
            "/appointments/{id}/status",
            patch(handlers::appointment::update_status),
        )
        .route(
            "/appointments/{id}/cancel",
            post(handlers::appointment::cancel_appointment),
        )
        .route(
            "/appointments/{id}/reschedule",
            post(handlers::appointment::reschedule_appointment),
        )
        .route(
            "/appointments/{id}/rate",
            post(handlers::appointment::rate_appointment),
        )
        // Conversation log
        .route(
            "/appointments/{id}/messages",
            get(handlers::message::list_messages).post(handlers::message::send_message),
        )
        .route(
            "/appointments/{id}/messages/read",
            post(handlers::message::mark_messages_read),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
