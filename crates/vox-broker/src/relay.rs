//! Reply delivery to the producer that issued a request.
//!
//! Delivery is at most once: no buffering, no retry, and the worker is never
//! told whether the producer was still there.

use tracing::debug;
use vox_core::ConnId;

use crate::connections::ConnectionTable;
use crate::protocol::OutboundEvent;
use crate::telemetry;

/// Result of [`deliver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the target's outbound channel.
    Delivered,
    /// The target is not connected.
    TargetGone,
    /// The target's queue was full or closed mid-send.
    QueueFull,
}

/// Send `event` to `target` if it is still connected, otherwise drop it.
pub async fn deliver(
    connections: &ConnectionTable,
    target: &ConnId,
    event: &OutboundEvent<'_>,
) -> Delivery {
    let delivery = match connections.get(target).await {
        Some(conn) if conn.is_open() => {
            if conn.send_event(event) {
                Delivery::Delivered
            } else {
                Delivery::QueueFull
            }
        }
        Some(_) | None => Delivery::TargetGone,
    };

    if delivery == Delivery::Delivered {
        metrics::counter!(telemetry::RESULTS_DELIVERED_TOTAL).increment(1);
    } else {
        metrics::counter!(telemetry::RESULTS_DROPPED_TOTAL).increment(1);
        debug!(target = %target, ?delivery, "reply dropped");
    }
    delivery
}
