//! Sync Reconciler: one consistent conversation view out of three producers.
//!
//! The server-persisted log is the sole source of truth. Push notifications
//! and the fixed-interval poll are both mere hints to re-fetch; the fetch
//! result is merged by server-assigned message id, so the merge is
//! idempotent and any interleaving of hint-triggered and poll-triggered
//! refreshes converges on the server state. Optimistic sends live as local
//! placeholders keyed by a client correlation token until the authoritative
//! response replaces them -- or marks them failed, with no automatic retry.

use std::sync::Mutex;
use std::time::Duration;

use exhale_types::error::MessageError;
use exhale_types::event::RoomSignal;
use exhale_types::message::AppointmentMessage;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Client-side port to the Message Store (REST in production, a fake in
/// tests).
pub trait MessageFeed: Send + Sync {
    /// Fetch the full ordered log for an appointment.
    fn fetch(
        &self,
        appointment_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AppointmentMessage>, MessageError>> + Send;

    /// Persist a message; returns it with the server-assigned id.
    fn send(
        &self,
        appointment_id: &Uuid,
        text: &str,
    ) -> impl std::future::Future<Output = Result<AppointmentMessage, MessageError>> + Send;
}

/// One entry in the reconciled view.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Authoritative server copy.
    Persisted(AppointmentMessage),
    /// Optimistic local placeholder, not yet (or never) acknowledged.
    Local {
        correlation: Uuid,
        text: String,
        failed: bool,
    },
}

impl ClientMessage {
    pub fn is_pending(&self) -> bool {
        matches!(self, ClientMessage::Local { failed: false, .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ClientMessage::Local { failed: true, .. })
    }
}

/// Reconciles one appointment's conversation on the consuming side.
pub struct SyncReconciler<F: MessageFeed> {
    feed: F,
    appointment_id: Uuid,
    view: Mutex<Vec<ClientMessage>>,
}

impl<F: MessageFeed> SyncReconciler<F> {
    pub fn new(feed: F, appointment_id: Uuid) -> Self {
        Self {
            feed,
            appointment_id,
            view: Mutex::new(Vec::new()),
        }
    }

    /// Current reconciled view: persisted messages in server order, then
    /// unresolved local placeholders in send order.
    pub fn snapshot(&self) -> Vec<ClientMessage> {
        self.view.lock().unwrap().clone()
    }

    /// Optimistically send a message.
    ///
    /// A placeholder appears in the view before the network round-trip
    /// completes. On success it is replaced (matched by the correlation
    /// token, never by guessing the server id); on failure it stays in the
    /// view marked failed and is not retried.
    pub async fn send(&self, text: &str) -> Result<AppointmentMessage, MessageError> {
        let correlation = Uuid::now_v7();
        self.view.lock().unwrap().push(ClientMessage::Local {
            correlation,
            text: text.to_string(),
            failed: false,
        });

        match self.feed.send(&self.appointment_id, text).await {
            Ok(message) => {
                let mut view = self.view.lock().unwrap();
                view.retain(|m| !matches!(m, ClientMessage::Local { correlation: c, .. } if *c == correlation));
                Self::merge_one(&mut view, message.clone());
                Ok(message)
            }
            Err(err) => {
                let mut view = self.view.lock().unwrap();
                for m in view.iter_mut() {
                    if let ClientMessage::Local {
                        correlation: c,
                        failed,
                        ..
                    } = m
                    {
                        if *c == correlation {
                            *failed = true;
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Re-fetch the full server log and merge it into the view.
    pub async fn refresh(&self) -> Result<(), MessageError> {
        let server = self.feed.fetch(&self.appointment_id).await?;
        let mut view = self.view.lock().unwrap();
        for message in server {
            Self::merge_one(&mut view, message);
        }
        Ok(())
    }

    /// Drive the reconciler: refresh on every push hint for this appointment
    /// and on every poll tick, until cancelled.
    ///
    /// A lagged hint receiver forces a refresh rather than dropping data; a
    /// closed hint channel (disconnect) leaves the poll running as the
    /// compensation path until the caller reconnects with a fresh receiver.
    pub async fn run(
        &self,
        mut hints: broadcast::Receiver<RoomSignal>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately: the reconnect-forced refresh.
        let mut hints_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = ticker.tick() => {
                    if let Err(err) = self.refresh().await {
                        warn!(appointment_id = %self.appointment_id, error = %err, "Poll refresh failed");
                    }
                }

                signal = hints.recv(), if hints_open => {
                    match signal {
                        Ok(signal) => {
                            if signal.event.appointment_id() != self.appointment_id {
                                continue;
                            }
                            debug!(appointment_id = %self.appointment_id, "Refreshing on push hint");
                            if let Err(err) = self.refresh().await {
                                warn!(appointment_id = %self.appointment_id, error = %err, "Hint refresh failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "Hint receiver lagged, forcing refresh");
                            if let Err(err) = self.refresh().await {
                                warn!(appointment_id = %self.appointment_id, error = %err, "Lag refresh failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            hints_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Insert-or-replace by server id, keeping persisted messages sorted by
    /// `(created_at, id)` ahead of local placeholders.
    fn merge_one(view: &mut Vec<ClientMessage>, message: AppointmentMessage) {
        if let Some(existing) = view.iter_mut().find(
            |m| matches!(m, ClientMessage::Persisted(p) if p.id == message.id),
        ) {
            *existing = ClientMessage::Persisted(message);
            return;
        }

        let key = (message.created_at, message.id);
        let insert_at = view
            .iter()
            .position(|m| match m {
                ClientMessage::Persisted(p) => (p.created_at, p.id) > key,
                ClientMessage::Local { .. } => true,
            })
            .unwrap_or(view.len());
        view.insert(insert_at, ClientMessage::Persisted(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use exhale_types::event::RoomEvent;
    use exhale_types::message::Role;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    /// Server stand-in: a log the tests mutate directly, plus a failure
    /// switch for the send path.
    #[derive(Clone, Default)]
    struct FakeFeed {
        log: Arc<Mutex<Vec<AppointmentMessage>>>,
        fail_sends: Arc<AtomicBool>,
        send_calls: Arc<AtomicU32>,
    }

    impl FakeFeed {
        fn push_server_side(&self, appointment_id: Uuid, text: &str) -> AppointmentMessage {
            let mut log = self.log.lock().unwrap();
            let message = AppointmentMessage {
                id: log.last().map(|m| m.id + 1).unwrap_or(1),
                appointment_id,
                sender_role: Role::Coach,
                text: text.to_string(),
                created_at: Utc::now(),
                read_by_participant: false,
                read_by_coach: true,
            };
            log.push(message.clone());
            message
        }
    }

    impl MessageFeed for FakeFeed {
        async fn fetch(
            &self,
            _appointment_id: &Uuid,
        ) -> Result<Vec<AppointmentMessage>, MessageError> {
            Ok(self.log.lock().unwrap().clone())
        }

        async fn send(
            &self,
            appointment_id: &Uuid,
            text: &str,
        ) -> Result<AppointmentMessage, MessageError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(MessageError::Storage("connection reset".to_string()));
            }
            let mut log = self.log.lock().unwrap();
            let message = AppointmentMessage {
                id: log.last().map(|m| m.id + 1).unwrap_or(1),
                appointment_id: *appointment_id,
                sender_role: Role::Participant,
                text: text.to_string(),
                created_at: Utc::now(),
                read_by_participant: true,
                read_by_coach: false,
            };
            log.push(message.clone());
            Ok(message)
        }
    }

    fn persisted_ids(view: &[ClientMessage]) -> Vec<i64> {
        view.iter()
            .filter_map(|m| match m {
                ClientMessage::Persisted(p) => Some(p.id),
                ClientMessage::Local { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn optimistic_send_replaces_placeholder() {
        let feed = FakeFeed::default();
        let reconciler = SyncReconciler::new(feed, Uuid::now_v7());

        let message = reconciler.send("quit day twelve").await.unwrap();
        assert_eq!(message.id, 1);

        let view = reconciler.snapshot();
        assert_eq!(view.len(), 1);
        assert!(matches!(&view[0], ClientMessage::Persisted(p) if p.id == 1));
    }

    #[tokio::test]
    async fn failed_send_is_kept_and_not_retried() {
        let feed = FakeFeed::default();
        feed.fail_sends.store(true, Ordering::SeqCst);
        let reconciler = SyncReconciler::new(feed.clone(), Uuid::now_v7());

        reconciler.send("lost this one").await.unwrap_err();

        let view = reconciler.snapshot();
        assert_eq!(view.len(), 1);
        assert!(view[0].is_failed());

        // A later refresh keeps the failed entry and never re-sends it.
        reconciler.refresh().await.unwrap();
        assert!(reconciler.snapshot()[0].is_failed());
        assert_eq!(feed.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_duplicate_free() {
        let appointment_id = Uuid::now_v7();
        let feed = FakeFeed::default();
        feed.push_server_side(appointment_id, "one");
        feed.push_server_side(appointment_id, "two");
        let reconciler = SyncReconciler::new(feed.clone(), appointment_id);

        reconciler.refresh().await.unwrap();
        reconciler.refresh().await.unwrap();
        assert_eq!(persisted_ids(&reconciler.snapshot()), vec![1, 2]);

        feed.push_server_side(appointment_id, "three");
        reconciler.refresh().await.unwrap();
        reconciler.refresh().await.unwrap();
        assert_eq!(persisted_ids(&reconciler.snapshot()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn reconciled_view_matches_server_after_any_interleaving() {
        let appointment_id = Uuid::now_v7();
        let feed = FakeFeed::default();
        let reconciler = Arc::new(SyncReconciler::new(feed.clone(), appointment_id));

        // Interleave server-side appends, own sends, and refreshes.
        feed.push_server_side(appointment_id, "coach opener");
        reconciler.refresh().await.unwrap();
        reconciler.send("reply").await.unwrap();
        feed.push_server_side(appointment_id, "coach follow-up");

        // Two concurrent refreshes (poll and hint paths racing).
        let (a, b) = tokio::join!(reconciler.refresh(), reconciler.refresh());
        a.unwrap();
        b.unwrap();

        let server_ids: Vec<i64> = feed.log.lock().unwrap().iter().map(|m| m.id).collect();
        assert_eq!(persisted_ids(&reconciler.snapshot()), server_ids);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_compensates_for_missed_pushes() {
        let appointment_id = Uuid::now_v7();
        let feed = FakeFeed::default();
        let reconciler = Arc::new(SyncReconciler::new(feed.clone(), appointment_id));

        // A hint channel that never carries the notification (dropped push).
        let (hint_tx, hint_rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let runner = {
            let reconciler = reconciler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                reconciler
                    .run(hint_rx, Duration::from_secs(5), cancel)
                    .await;
            })
        };

        feed.push_server_side(appointment_id, "sent while disconnected");

        // Within one polling interval the message appears, despite no hint.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(persisted_ids(&reconciler.snapshot()), vec![1]);

        cancel.cancel();
        runner.await.unwrap();
        drop(hint_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn push_hint_triggers_refresh_before_next_poll() {
        let appointment_id = Uuid::now_v7();
        let feed = FakeFeed::default();
        let reconciler = Arc::new(SyncReconciler::new(feed.clone(), appointment_id));

        let (hint_tx, hint_rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let runner = {
            let reconciler = reconciler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                // A poll slow enough that only the hint can explain a fast refresh.
                reconciler
                    .run(hint_rx, Duration::from_secs(3600), cancel)
                    .await;
            })
        };
        // Let the immediate startup refresh pass.
        tokio::time::sleep(Duration::from_millis(10)).await;

        feed.push_server_side(appointment_id, "pushed");
        hint_tx
            .send(RoomSignal {
                origin: None,
                event: RoomEvent::NewMessage { appointment_id },
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(persisted_ids(&reconciler.snapshot()), vec![1]);

        cancel.cancel();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hints_for_other_appointments_are_ignored() {
        let appointment_id = Uuid::now_v7();
        let feed = FakeFeed::default();
        let reconciler = Arc::new(SyncReconciler::new(feed.clone(), appointment_id));

        let (hint_tx, hint_rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let runner = {
            let reconciler = reconciler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                reconciler
                    .run(hint_rx, Duration::from_secs(3600), cancel)
                    .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        feed.push_server_side(appointment_id, "for someone else to fetch");
        hint_tx
            .send(RoomSignal {
                origin: None,
                event: RoomEvent::NewMessage {
                    appointment_id: Uuid::now_v7(),
                },
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        // The foreign hint did not trigger a refresh.
        assert!(persisted_ids(&reconciler.snapshot()).is_empty());

        cancel.cancel();
        runner.await.unwrap();
    }
}
