//! Business logic and repository trait definitions for Exhale.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements. It depends only on `exhale-types` -- never on
//! `exhale-infra` or any database/IO crate.

pub mod messaging;
pub mod realtime;
pub mod scheduling;
pub mod sync;
