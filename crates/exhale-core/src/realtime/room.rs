//! Per-appointment room registry over `tokio::sync::broadcast`.
//!
//! Rooms are transient and in-memory only: they are rebuilt on every
//! connect/reconnect and carry no business state. A newly joined receiver
//! gets nothing retroactive -- consumers catch up through the Message Store.
//! Delivery is at-most-once and best-effort: publishing to an empty room is
//! a no-op, and a send failure is swallowed, never surfaced to the caller.
//! Compensation for dropped events is the Sync Reconciler's polling path.

use dashmap::DashMap;
use exhale_types::event::{RoomEvent, RoomSignal};
use exhale_types::identity::Role;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Registry of live rooms keyed by appointment id.
///
/// Shared behind an `Arc` so the HTTP handlers and the WebSocket handler
/// publish into the same rooms.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, broadcast::Sender<RoomSignal>>,
    capacity: usize,
}

impl RoomRegistry {
    /// Create a registry whose rooms buffer up to `capacity` undelivered
    /// signals per receiver before lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Join an appointment's room, creating it if needed.
    ///
    /// The receiver sees only signals published after this call.
    pub fn join(&self, appointment_id: Uuid) -> broadcast::Receiver<RoomSignal> {
        self.rooms
            .entry(appointment_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Broadcast a content-free "new message" hint to the room.
    pub fn notify_new_message(&self, appointment_id: Uuid, origin: Option<Uuid>) {
        self.publish(
            appointment_id,
            RoomSignal {
                origin,
                event: RoomEvent::NewMessage { appointment_id },
            },
        );
    }

    /// Broadcast a read-receipt event to the room.
    pub fn notify_read(&self, appointment_id: Uuid, reader_role: Role, origin: Option<Uuid>) {
        self.publish(
            appointment_id,
            RoomSignal {
                origin,
                event: RoomEvent::MessagesRead {
                    appointment_id,
                    reader_role,
                },
            },
        );
    }

    /// Live receiver count for a room.
    pub fn room_size(&self, appointment_id: &Uuid) -> usize {
        self.rooms
            .get(appointment_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn publish(&self, appointment_id: Uuid, signal: RoomSignal) {
        let Some(sender) = self.rooms.get(&appointment_id).map(|tx| tx.value().clone()) else {
            return;
        };
        if sender.send(signal).is_err() {
            // Every receiver is gone; drop the empty room.
            tracing::debug!(appointment_id = %appointment_id, "Dropping empty room");
            self.rooms
                .remove_if(&appointment_id, |_, tx| tx.receiver_count() == 0);
        }
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
