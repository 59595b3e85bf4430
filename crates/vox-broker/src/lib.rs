//! # vox-broker
//!
//! The decision engine of the relay. For every inbound event it decides
//! whether the event is permitted, where it goes, and how the eventual reply
//! finds its way home.
//!
//! - [`WorkerRegistry`]: one connection per worker group, last writer wins
//! - [`RateLimiter`]: minimum spacing between a producer's admitted requests
//! - [`Router`]: language tag → worker group, plus the `store` mirror
//! - [`relay`]: result delivery to the originating producer
//! - [`Broker`]: connection lifecycle and per-event handling
//!
//! The broker is transport-agnostic: it consumes text frames and writes to
//! each connection's outbound queue.

#![deny(unsafe_code)]

pub mod broker;
pub mod connection;
pub mod connections;
pub mod errors;
pub mod telemetry;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod relay;
pub mod router;

pub use broker::{Broker, BrokerConfig, Disposition};
pub use connection::{ClientConnection, Role};
pub use connections::ConnectionTable;
pub use errors::BrokerError;
pub use rate_limit::RateLimiter;
pub use registry::WorkerRegistry;
pub use router::{DispatchOutcome, Request, Router, RoutingTable};
