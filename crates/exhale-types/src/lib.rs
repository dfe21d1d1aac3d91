//! Shared domain types for Exhale.
//!
//! This crate contains the core domain types used across the Exhale coaching
//! platform: Appointment, AppointmentMessage, AvailabilityWindow, Principal,
//! room events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod appointment;
pub mod availability;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
