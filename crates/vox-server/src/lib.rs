//! # vox-server
//!
//! Axum HTTP + `WebSocket` front end for the relay broker.
//!
//! - `GET /ws`: the relay socket (connection cap, heartbeat, per-connection task)
//! - `GET /health`: liveness plus worker slot status
//! - `GET /metrics`: Prometheus text
//! - `POST /admin/keys`: worker key issuance, guarded by the admin secret
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod admin;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{Result, ServerError};
pub use server::{AppState, ServerHandle, VoxServer};
pub use shutdown::ShutdownCoordinator;
