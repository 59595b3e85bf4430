//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;
use vox_core::{ConnId, GroupName};

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current `WebSocket` connection count.
    pub connections: usize,
    /// Slot status per worker group.
    pub workers: Vec<WorkerStatus>,
}

/// Whether a group currently has a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    /// Worker group.
    pub group: GroupName,
    /// Whether a worker holds the slot.
    pub bound: bool,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    slots: &[(GroupName, Option<ConnId>)],
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        workers: slots
            .iter()
            .map(|(group, holder)| WorkerStatus {
                group: *group,
                bound: holder.is_some(),
            })
            .collect(),
    }
}
