//! WebSocket handler for the per-appointment realtime channel.
//!
//! The `/ws` endpoint upgrades an authenticated HTTP connection to a
//! WebSocket. Once connected, the handler:
//!
//! - **Joins rooms:** `join-appointment` subscribes the connection to an
//!   appointment's room. Joining replays nothing -- the client must fetch
//!   the message log over REST to catch up.
//! - **Forwards signals:** every room signal is pushed to the client as a
//!   JSON text frame (`new-message`, `messages-read`), except signals the
//!   connection itself originated.
//! - **Relays notifications:** `message-notification` re-broadcasts a
//!   content-free hint after the client has persisted a message over REST;
//!   `mark-messages-read` flips read flags and broadcasts the receipt.
//!
//! Delivery is at-most-once and best-effort. Lagged receivers are logged and
//! tolerated; consumers compensate by re-fetching. Disconnecting destroys
//! the connection's room subscriptions and nothing else.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use exhale_types::event::RoomSignal;
use exhale_types::identity::Principal;

use crate::state::AppState;

/// Incoming command from a WebSocket client.
///
/// Clients send JSON-encoded text frames matching one of these variants.
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
enum WsCommand {
    /// Subscribe this connection to an appointment's room.
    JoinAppointment { appointment_id: String },
    /// Hint that a message was persisted over REST; re-broadcast to the room.
    MessageNotification { appointment_id: String },
    /// Mark counterpart messages read and broadcast the receipt.
    MarkMessagesRead { appointment_id: String },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Upgrade an HTTP request to a WebSocket connection for room events.
///
/// This is mounted at `/ws` in the router; the upgrade request itself must
/// carry a valid access token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    principal: Principal,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, principal))
}

/// Per-connection state: the rooms this socket joined, each with its
/// forwarder task feeding the shared signal queue.
struct WsSession {
    connection_id: Uuid,
    principal: Principal,
    signals_tx: mpsc::Sender<RoomSignal>,
    joined: HashMap<Uuid, JoinHandle<()>>,
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between room signals (aggregated from
/// all joined rooms into one mpsc queue) and incoming WebSocket messages.
/// This keeps both sender and receiver in a single task, enabling
/// bidirectional communication (e.g., responding to `Ping` with a pong).
async fn handle_ws_connection(socket: WebSocket, state: AppState, principal: Principal) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (signals_tx, mut signals_rx) = mpsc::channel::<RoomSignal>(64);
    let mut session = WsSession {
        connection_id: Uuid::now_v7(),
        principal,
        signals_tx,
        joined: HashMap::new(),
    };

    loop {
        tokio::select! {
            // --- Branch 1: Forward room signals to the WebSocket client ---
            signal = signals_rx.recv() => {
                let Some(signal) = signal else { break };
                // Skip the echo of this connection's own action.
                if signal.origin == Some(session.connection_id) {
                    continue;
                }
                match serde_json::to_string(&signal.event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            // Client disconnected
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Failed to serialize RoomEvent: {err}");
                    }
                }
            }

            // --- Branch 2: Process commands from the WebSocket client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_command(&text, &mut ws_sender, &mut session, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Client disconnected
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Room subscriptions die with the connection.
    for (_, forwarder) in session.joined.drain() {
        forwarder.abort();
    }
    tracing::debug!(connection_id = %session.connection_id, "WebSocket connection closed");
}

/// Parse and process a single command from the WebSocket client.
async fn process_command(
    text: &str,
    ws_sender: &mut SplitSink<WebSocket, Message>,
    session: &mut WsSession,
    state: &AppState,
) {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket command"
            );
            return;
        }
    };

    match cmd {
        WsCommand::JoinAppointment { appointment_id } => {
            let Some(id) = authorized_appointment(&appointment_id, session, state).await else {
                return;
            };
            if session.joined.contains_key(&id) {
                return;
            }
            let receiver = state.rooms.join(id);
            let forwarder = spawn_forwarder(receiver, session.signals_tx.clone());
            session.joined.insert(id, forwarder);
            tracing::debug!(appointment_id = %id, "Joined room");
        }
        WsCommand::MessageNotification { appointment_id } => {
            let Some(id) = authorized_appointment(&appointment_id, session, state).await else {
                return;
            };
            state.rooms.notify_new_message(id, Some(session.connection_id));
        }
        WsCommand::MarkMessagesRead { appointment_id } => {
            let Some(id) = authorized_appointment(&appointment_id, session, state).await else {
                return;
            };
            match state.messages.mark_read(session.principal, &id).await {
                Ok(()) => {
                    state
                        .rooms
                        .notify_read(id, session.principal.role, Some(session.connection_id));
                }
                Err(err) => {
                    tracing::warn!(appointment_id = %id, error = %err, "mark-messages-read failed");
                }
            }
        }
        WsCommand::Ping => {
            let pong = r#"{"type":"pong"}"#;
            if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                tracing::debug!("Failed to send pong (client disconnecting)");
            }
        }
    }
}

/// Parse the appointment id and verify the session's principal is a party.
/// Unauthorized or malformed commands are logged and dropped.
async fn authorized_appointment(
    raw_id: &str,
    session: &WsSession,
    state: &AppState,
) -> Option<Uuid> {
    let id = match Uuid::parse_str(raw_id) {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(appointment_id = %raw_id, error = %err, "Invalid appointment UUID");
            return None;
        }
    };
    match state.appointments.get_owned(session.principal, &id).await {
        Ok(_) => Some(id),
        Err(err) => {
            tracing::warn!(appointment_id = %id, error = %err, "Room access denied");
            None
        }
    }
}

/// Forward one room's broadcast receiver into the connection's signal queue.
///
/// Lag means the room outpaced this connection; the consumer recovers by
/// re-fetching, so the forwarder just logs and keeps receiving.
fn spawn_forwarder(
    mut receiver: broadcast::Receiver<RoomSignal>,
    signals_tx: mpsc::Sender<RoomSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(signal) => {
                    if signals_tx.send(signal).await.is_err() {
                        // Connection handler dropped the queue
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Room subscriber lagged, skipping {n} signals");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
