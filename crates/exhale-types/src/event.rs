//! Room notification events pushed over the realtime channel.
//!
//! Events are notification-only: they carry no business payload beyond the
//! identifiers a consumer needs to re-fetch. Delivery is at-most-once and
//! best-effort; a consumer must treat every event as a hint to re-fetch,
//! never as the data of record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Role;

/// Server-to-client room event, serialized straight onto the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    /// Something was appended to the conversation; re-fetch the list.
    NewMessage { appointment_id: Uuid },
    /// The given role has read the counterpart's messages.
    MessagesRead {
        appointment_id: Uuid,
        reader_role: Role,
    },
}

impl RoomEvent {
    pub fn appointment_id(&self) -> Uuid {
        match self {
            RoomEvent::NewMessage { appointment_id }
            | RoomEvent::MessagesRead { appointment_id, .. } => *appointment_id,
        }
    }
}

/// Internal envelope broadcast within a room.
///
/// `origin` identifies the connection whose action produced the event so its
/// own socket can skip the echo; it never reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomSignal {
    pub origin: Option<Uuid>,
    pub event: RoomEvent,
}
