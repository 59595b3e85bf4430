//! Metric names recorded by the broker.
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! the calls are no-ops.

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "vox_connections_total";
/// Currently open connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "vox_connections_active";
/// Successful worker identifications (counter, labels: group).
pub const WORKER_BINDS_TOTAL: &str = "vox_worker_binds_total";
/// Failed worker identifications (counter).
pub const AUTH_FAILURES_TOTAL: &str = "vox_auth_failures_total";
/// Producer requests admitted by the rate limiter (counter).
pub const REQUESTS_ADMITTED_TOTAL: &str = "vox_requests_admitted_total";
/// Producer requests dropped by the rate limiter (counter).
pub const REQUESTS_RATE_LIMITED_TOTAL: &str = "vox_requests_rate_limited_total";
/// Requests rejected as malformed (counter).
pub const REQUESTS_INVALID_TOTAL: &str = "vox_requests_invalid_total";
/// Requests dispatched to a transcription worker (counter, labels: group).
pub const DISPATCHES_TOTAL: &str = "vox_dispatches_total";
/// Requests mirrored to the store worker (counter).
pub const STORE_MIRRORS_TOTAL: &str = "vox_store_mirrors_total";
/// Requests that found no worker or no route (counter, labels: reason).
pub const ROUTING_FAILURES_TOTAL: &str = "vox_routing_failures_total";
/// Results delivered to producers (counter).
pub const RESULTS_DELIVERED_TOTAL: &str = "vox_results_delivered_total";
/// Results whose producer was gone or saturated (counter).
pub const RESULTS_DROPPED_TOTAL: &str = "vox_results_dropped_total";
