//! Client-side reconciliation of optimistic sends, push hints, and polls.

pub mod reconciler;

pub use reconciler::{ClientMessage, MessageFeed, SyncReconciler};
