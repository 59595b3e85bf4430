//! Per-connection `WebSocket` task.
//!
//! Each socket is split into a writer task (outbound queue plus pings) and
//! an inline reader loop that hands text frames to the broker one at a time,
//! in arrival order. A heartbeat task closes the connection when the client
//! goes silent.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vox_broker::{ClientConnection, Disposition};

use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::server::AppState;
use crate::shutdown::ShutdownCoordinator;

/// `GET /ws`. Refuses the upgrade with 503 once the connection cap is reached
/// or shutdown has begun.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let slot = match reserve_slot(&state.connection_slots, &state.shutdown) {
        Ok(slot) => slot,
        Err(reason) => {
            warn!(max = state.config.max_connections, reason, "refusing upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, reason).into_response();
        }
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, slot))
}

/// Claim a connection slot before the handshake completes.
///
/// Dropping the permit frees the slot, including when the upgrade fails.
fn reserve_slot(
    slots: &Arc<Semaphore>,
    shutdown: &ShutdownCoordinator,
) -> Result<OwnedSemaphorePermit, &'static str> {
    if shutdown.is_shutting_down() {
        return Err("server is shutting down");
    }
    Arc::clone(slots)
        .try_acquire_owned()
        .map_err(|_| "connection limit reached")
}

/// Drive one accepted socket until it closes, then release its broker state
/// and its connection slot.
pub async fn handle_socket(socket: WebSocket, state: AppState, slot: OwnedSemaphorePermit) {
    let (tx, rx) = mpsc::channel(state.config.send_queue_size);
    let conn = Arc::new(ClientConnection::new(tx));
    let broker = Arc::clone(&state.broker);
    broker.connect(Arc::clone(&conn)).await;

    let (ws_tx, mut ws_rx) = socket.split();
    let close = conn.close_token();
    let shutdown = state.shutdown.token();

    let writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        close.clone(),
        state.config.heartbeat_interval,
    ));

    let heartbeat = tokio::spawn({
        let conn = Arc::clone(&conn);
        let interval = state.config.heartbeat_interval;
        let timeout = state.config.heartbeat_timeout;
        async move {
            if run_heartbeat(Arc::clone(&conn), interval, timeout, conn.close_token()).await
                == HeartbeatResult::TimedOut
            {
                info!(conn_id = %conn.id, "heartbeat timed out");
                conn.close();
            }
        }
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    conn.mark_alive();
                    if broker.handle_message(&conn, text.as_str()).await == Disposition::Close {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => conn.mark_alive(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Binary(_) | Message::Ping(_))) => conn.mark_alive(),
                Some(Err(e)) => {
                    debug!(conn_id = %conn.id, error = %e, "websocket read error");
                    break;
                }
            },
            () = close.cancelled() => break,
            () = shutdown.cancelled() => break,
        }
    }

    conn.close();
    broker.disconnect(&conn).await;
    let _ = writer.await;
    let _ = heartbeat.await;
    drop(slot);
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<String>>,
    close: CancellationToken,
    ping_every: std::time::Duration,
) {
    let mut ping_interval = tokio::time::interval(ping_every);
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(text_frame(&frame)).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
            }
            () = close.cancelled() => {
                // Flush what the broker already queued, e.g. a final error.
                while let Ok(frame) = rx.try_recv() {
                    if ws_tx.send(text_frame(&frame)).await.is_err() {
                        return;
                    }
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

fn text_frame(frame: &str) -> Message {
    Message::Text(frame.to_owned().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_run_out_at_the_cap() {
        let slots = Arc::new(Semaphore::new(2));
        let shutdown = ShutdownCoordinator::new();
        let first = reserve_slot(&slots, &shutdown).unwrap();
        let _second = reserve_slot(&slots, &shutdown).unwrap();
        assert_eq!(
            reserve_slot(&slots, &shutdown).unwrap_err(),
            "connection limit reached"
        );

        drop(first);
        assert!(reserve_slot(&slots, &shutdown).is_ok());
    }

    #[test]
    fn no_slots_during_shutdown() {
        let slots = Arc::new(Semaphore::new(4));
        let shutdown = ShutdownCoordinator::new();
        shutdown.shutdown();
        assert_eq!(
            reserve_slot(&slots, &shutdown).unwrap_err(),
            "server is shutting down"
        );
        assert_eq!(slots.available_permits(), 4);
    }
}
