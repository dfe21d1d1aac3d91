//! Observability setup for Exhale: structured tracing with optional
//! OpenTelemetry export.

pub mod tracing_setup;
