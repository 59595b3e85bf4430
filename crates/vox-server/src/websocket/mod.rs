//! `WebSocket` transport: upgrade handling, per-connection task, heartbeat.

pub mod handler;
pub mod heartbeat;
