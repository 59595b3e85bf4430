//! Connection lifecycle and per-event handling.
//!
//! A [`Broker`] owns the worker registry, the rate-limit table, the router
//! and the table of open connections. The transport calls
//! [`connect`](Broker::connect) on accept, [`handle_message`](Broker::handle_message)
//! for every text frame in arrival order, and [`disconnect`](Broker::disconnect)
//! once the connection is gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use vox_auth::CredentialStore;
use vox_core::{GroupName, LanguageTag};

use crate::connection::{ClientConnection, Role};
use crate::connections::ConnectionTable;
use crate::errors::{BrokerError, TRANSCRIPTION_UNAVAILABLE};
use crate::protocol::{
    AudioRequest, EventKind, IdentifyWorker, InboundEvent, OutboundEvent, ProtocolError,
    WorkerError, WorkerResult,
};
use crate::rate_limit::{DEFAULT_MIN_INTERVAL, RateLimiter};
use crate::registry::WorkerRegistry;
use crate::relay;
use crate::router::{DispatchOutcome, Request, Router, RoutingTable};
use crate::telemetry;

/// Startup parameters, fixed for the life of the broker.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Minimum spacing between a producer's admitted requests.
    pub min_request_interval: Duration,
    /// Language → group table.
    pub routing: RoutingTable,
    /// Upper bound on one credential check.
    pub validate_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            min_request_interval: DEFAULT_MIN_INTERVAL,
            routing: RoutingTable::standard(),
            validate_timeout: Duration::from_secs(5),
        }
    }
}

/// What the transport should do after a frame was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Keep reading.
    Continue,
    /// Close the connection.
    Close,
}

/// The relay's decision engine.
pub struct Broker {
    registry: WorkerRegistry,
    limiter: RateLimiter,
    router: Router,
    connections: ConnectionTable,
    credentials: Arc<dyn CredentialStore>,
    validate_timeout: Duration,
}

impl Broker {
    /// Create a broker.
    pub fn new(config: BrokerConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            registry: WorkerRegistry::new(),
            limiter: RateLimiter::new(config.min_request_interval),
            router: Router::new(config.routing),
            connections: ConnectionTable::new(),
            credentials,
            validate_timeout: config.validate_timeout,
        }
    }

    /// Group slots.
    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Open connections.
    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    /// Per-connection rate-limit state.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Credential store used for worker identification.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Start tracking a new connection and greet it with its id.
    pub async fn connect(&self, conn: Arc<ClientConnection>) {
        self.limiter.register(&conn.id);
        self.connections.add(Arc::clone(&conn)).await;
        let _ = conn.send_event(&OutboundEvent::Connected { conn_id: &conn.id });
        info!(conn_id = %conn.id, "connection opened");
        metrics::counter!(telemetry::CONNECTIONS_TOTAL).increment(1);
        metrics::gauge!(telemetry::CONNECTIONS_ACTIVE).increment(1.0);
    }

    /// Release everything held for `conn`. Idempotent.
    ///
    /// A worker's slot is cleared only if it still holds it.
    pub async fn disconnect(&self, conn: &ClientConnection) {
        let removed = self.connections.remove(&conn.id).await;
        self.limiter.forget(&conn.id);

        if let Some(group) = conn.group() {
            if self.registry.unbind(group, &conn.id) {
                info!(conn_id = %conn.id, %group, "worker slot released");
            } else {
                debug!(conn_id = %conn.id, %group, "worker no longer held its slot");
            }
        }

        if removed.is_some() {
            metrics::gauge!(telemetry::CONNECTIONS_ACTIVE).decrement(1.0);
            info!(
                conn_id = %conn.id,
                dropped = conn.drop_count(),
                connected_for = ?conn.connected_at.elapsed(),
                "connection closed"
            );
        }
    }

    /// Ask every open connection to close.
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
    }

    /// Handle one inbound text frame from `conn`.
    pub async fn handle_message(&self, conn: &Arc<ClientConnection>, text: &str) -> Disposition {
        match InboundEvent::parse(text) {
            Ok(InboundEvent::IdentifyWorker(identify)) => {
                self.on_identify(conn, Some(identify)).await
            }
            Ok(InboundEvent::AudioRequest(request)) => {
                self.on_audio_request(conn, Some(request)).await;
                Disposition::Continue
            }
            Ok(InboundEvent::WorkerResult(result)) => {
                self.on_worker_result(conn, result).await;
                Disposition::Continue
            }
            Ok(InboundEvent::WorkerError(report)) => {
                self.on_worker_error(conn, report).await;
                Disposition::Continue
            }
            Err(ProtocolError::InvalidData { kind, source }) => {
                debug!(conn_id = %conn.id, %kind, error = %source, "invalid event payload");
                match kind {
                    EventKind::IdentifyWorker => self.on_identify(conn, None).await,
                    EventKind::AudioRequest => {
                        self.on_audio_request(conn, None).await;
                        Disposition::Continue
                    }
                    EventKind::WorkerResult | EventKind::WorkerError => {
                        warn!(conn_id = %conn.id, %kind, "ignoring malformed worker event");
                        Disposition::Continue
                    }
                }
            }
            Err(e) => {
                debug!(conn_id = %conn.id, error = %e, "ignoring frame");
                Disposition::Continue
            }
        }
    }

    // ── identify_worker ─────────────────────────────────────────────

    async fn on_identify(
        &self,
        conn: &Arc<ClientConnection>,
        identify: Option<IdentifyWorker>,
    ) -> Disposition {
        match conn.role() {
            Role::Producer => {
                warn!(conn_id = %conn.id, "identify_worker from a producer, ignoring");
                return Disposition::Continue;
            }
            Role::Worker(group) => {
                warn!(conn_id = %conn.id, %group, "worker already identified, ignoring");
                return Disposition::Continue;
            }
            Role::Unassigned => {}
        }

        match self.identify(conn, identify).await {
            Ok(_) => Disposition::Continue,
            Err(e) => {
                metrics::counter!(telemetry::AUTH_FAILURES_TOTAL).increment(1);
                warn!(conn_id = %conn.id, error = %e, "worker identification failed");
                if e.is_terminal() {
                    conn.close();
                    Disposition::Close
                } else {
                    Disposition::Continue
                }
            }
        }
    }

    async fn identify(
        &self,
        conn: &ClientConnection,
        identify: Option<IdentifyWorker>,
    ) -> Result<GroupName, BrokerError> {
        let identify = identify.ok_or_else(|| {
            BrokerError::AuthenticationFailed("malformed identify_worker payload".into())
        })?;
        let group: GroupName = identify.group.parse()?;
        if identify.key.is_empty() {
            return Err(BrokerError::AuthenticationFailed("missing key".into()));
        }

        // No broker lock is held across this await.
        let valid = tokio::time::timeout(
            self.validate_timeout,
            self.credentials.validate(&identify.key, group),
        )
        .await
        .map_err(|_| BrokerError::CredentialStoreUnavailable)?;
        if !valid {
            return Err(BrokerError::AuthenticationFailed(format!(
                "credential rejected for group {group}"
            )));
        }

        conn.set_role(Role::Worker(group));
        if let Some(evicted) = self.registry.bind(group, conn.id.clone()) {
            warn!(conn_id = %conn.id, %group, evicted = %evicted, "worker slot taken over");
        }
        let _ = conn.send_event(&OutboundEvent::WorkerIdentified { group });
        metrics::counter!(telemetry::WORKER_BINDS_TOTAL, "group" => group.as_str()).increment(1);
        info!(conn_id = %conn.id, %group, "worker identified");
        Ok(group)
    }

    // ── audio_request ───────────────────────────────────────────────

    async fn on_audio_request(&self, conn: &ClientConnection, request: Option<AudioRequest>) {
        match conn.role() {
            Role::Worker(group) => {
                warn!(conn_id = %conn.id, %group, "audio_request from a worker, ignoring");
                return;
            }
            Role::Unassigned => conn.set_role(Role::Producer),
            Role::Producer => {}
        }

        if let Err(e) = self.submit(conn, request).await {
            if let Some(message) = e.producer_message() {
                let _ = conn.send_event(&OutboundEvent::TranscriptionError { message: &message });
            }
        }
    }

    async fn submit(
        &self,
        conn: &ClientConnection,
        request: Option<AudioRequest>,
    ) -> Result<(), BrokerError> {
        // Admission is checked before the payload, so malformed frames also
        // consume the producer's window.
        if !self.limiter.try_admit(&conn.id, Instant::now()) {
            metrics::counter!(telemetry::REQUESTS_RATE_LIMITED_TOTAL).increment(1);
            debug!(conn_id = %conn.id, "request rate limited");
            return Err(BrokerError::RateLimited);
        }
        metrics::counter!(telemetry::REQUESTS_ADMITTED_TOTAL).increment(1);

        // Non-finite samples cannot be re-encoded as JSON numbers.
        let Some((payload, language)) = request
            .filter(|r| r.audio_float32.iter().all(|sample| sample.is_finite()))
            .and_then(|r| {
                LanguageTag::new(r.language).map(|language| (r.audio_float32, language))
            })
        else {
            metrics::counter!(telemetry::REQUESTS_INVALID_TOTAL).increment(1);
            warn!(conn_id = %conn.id, "invalid audio_request payload");
            return Err(BrokerError::InvalidRequestFormat);
        };

        let request = Request {
            payload,
            language,
            origin: conn.id.clone(),
        };
        match self
            .router
            .route(&request, &self.registry, &self.connections)
            .await
        {
            DispatchOutcome::Dispatched { .. } => Ok(()),
            DispatchOutcome::UnsupportedLanguage => {
                metrics::counter!(telemetry::ROUTING_FAILURES_TOTAL, "reason" => "unsupported")
                    .increment(1);
                Err(BrokerError::UnsupportedLanguage(request.language))
            }
            DispatchOutcome::ServiceUnavailable { .. } => {
                metrics::counter!(telemetry::ROUTING_FAILURES_TOTAL, "reason" => "unavailable")
                    .increment(1);
                Err(BrokerError::ServiceUnavailable(request.language))
            }
        }
    }

    // ── worker replies ──────────────────────────────────────────────

    async fn on_worker_result(&self, conn: &ClientConnection, result: WorkerResult) {
        let Some(group) = conn.group() else {
            warn!(conn_id = %conn.id, "worker_result from a non-worker, ignoring");
            return;
        };
        if result.transcript.is_empty() {
            debug!(conn_id = %conn.id, %group, "empty transcript, ignoring");
            return;
        }
        let delivery = relay::deliver(
            &self.connections,
            &result.target_conn_id,
            &OutboundEvent::TranscriptionResult {
                transcript: &result.transcript,
            },
        )
        .await;
        debug!(
            conn_id = %conn.id,
            %group,
            target = %result.target_conn_id,
            ?delivery,
            "worker result relayed"
        );
    }

    async fn on_worker_error(&self, conn: &ClientConnection, report: WorkerError) {
        let Some(group) = conn.group() else {
            warn!(conn_id = %conn.id, "worker_error from a non-worker, ignoring");
            return;
        };
        warn!(
            conn_id = %conn.id,
            %group,
            target = %report.target_conn_id,
            error = report.error.as_deref().unwrap_or("unspecified"),
            "worker reported failure"
        );
        let _ = relay::deliver(
            &self.connections,
            &report.target_conn_id,
            &OutboundEvent::TranscriptionError {
                message: TRANSCRIPTION_UNAVAILABLE,
            },
        )
        .await;
    }
}
