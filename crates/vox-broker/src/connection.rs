//! Per-connection state shared between the transport and the broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vox_core::{ConnId, GroupName};

use crate::protocol::OutboundEvent;

/// What a connection has declared itself to be.
///
/// Roles are exclusive for the lifetime of a connection: once a connection
/// is a producer or a worker it stays one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    /// Nothing received yet.
    #[default]
    Unassigned,
    /// Has submitted at least one request.
    Producer,
    /// Authenticated for a group. The tag survives eviction from the slot.
    Worker(GroupName),
}

/// A connected client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnId,
    role: Mutex<Role>,
    /// Send channel to the client's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Fired when the broker wants the transport to hang up.
    close: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Last pong or inbound frame.
    last_seen: Mutex<Instant>,
    /// Count of messages dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection with a fresh id.
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        Self::with_id(ConnId::new(), tx)
    }

    /// Create a connection with a caller-chosen id.
    pub fn with_id(id: ConnId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            role: Mutex::new(Role::Unassigned),
            tx,
            close: CancellationToken::new(),
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current role.
    pub fn role(&self) -> Role {
        *self.role.lock()
    }

    /// Replace the role.
    pub fn set_role(&self, role: Role) {
        *self.role.lock() = role;
    }

    /// Group tag, if this connection is a worker.
    pub fn group(&self) -> Option<GroupName> {
        match self.role() {
            Role::Worker(group) => Some(group),
            Role::Unassigned | Role::Producer => None,
        }
    }

    /// Queue a text frame for the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize an event and queue it.
    pub fn send_event(&self, event: &OutboundEvent<'_>) -> bool {
        match event.to_frame() {
            Ok(frame) => self.send(frame),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Whether the outbound channel still has a receiver.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed() && !self.close.is_cancelled()
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Ask the transport to close this connection.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token fired by [`close`](Self::close).
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Record activity from the client (pong or any frame).
    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Duration since the last recorded activity (or connection establishment).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::with_id(ConnId::from("conn_1"), tx), rx)
    }

    #[test]
    fn starts_unassigned_and_alive() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.role(), Role::Unassigned);
        assert!(conn.group().is_none());
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn send_event_delivers_json() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send_event(&OutboundEvent::TranscriptionError { message: "x" }));
        let frame = rx.recv().await.unwrap();
        assert!(frame.contains("transcription_error"));
    }

    #[test]
    fn full_channel_counts_drops() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_receiver_is_not_open() {
        let (conn, rx) = make_connection(1);
        drop(rx);
        assert!(!conn.is_open());
        assert!(!conn.send(Arc::new("a".into())));
    }

    #[test]
    fn worker_role_carries_group() {
        let (conn, _rx) = make_connection(1);
        conn.set_role(Role::Worker(GroupName::Whisper));
        assert_eq!(conn.group(), Some(GroupName::Whisper));
    }

    #[tokio::test]
    async fn close_fires_token() {
        let (conn, _rx) = make_connection(1);
        let token = conn.close_token();
        conn.close();
        token.cancelled().await;
        assert!(conn.is_closed());
        assert!(!conn.is_open());
    }

    #[test]
    fn mark_alive_resets_idle_time() {
        let (conn, _rx) = make_connection(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.last_seen_elapsed() >= Duration::from_millis(20));
        conn.mark_alive();
        assert!(conn.last_seen_elapsed() < Duration::from_millis(20));
    }
}
