//! Infrastructure implementations for Exhale.
//!
//! SQLite repositories (via sqlx, WAL mode, split reader/writer pools) for
//! the ports defined in `exhale-core`, plus the TOML configuration loader.

pub mod config;
pub mod sqlite;
