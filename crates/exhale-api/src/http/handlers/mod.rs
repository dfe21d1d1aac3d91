//! HTTP request handlers for the REST API.

pub mod appointment;
pub mod message;
pub mod ws;
