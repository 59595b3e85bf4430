//! `VoxServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use vox_broker::Broker;

use crate::admin;
use crate::config::ServerConfig;
use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay broker.
    pub broker: Arc<Broker>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
    /// One permit per allowed `WebSocket`, held for the socket's lifetime.
    pub connection_slots: Arc<Semaphore>,
}

/// The relay server.
pub struct VoxServer {
    config: Arc<ServerConfig>,
    broker: Arc<Broker>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    connection_slots: Arc<Semaphore>,
    start_time: Instant,
}

impl VoxServer {
    /// Create a server around a broker.
    pub fn new(config: ServerConfig, broker: Arc<Broker>) -> Self {
        let slots = config.max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            connection_slots: Arc::new(Semaphore::new(slots)),
            config: Arc::new(config),
            broker,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Result<Router> {
        let state = AppState {
            broker: Arc::clone(&self.broker),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            connection_slots: Arc::clone(&self.connection_slots),
        };

        Ok(Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/admin/keys", post(admin::issue_key))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.allowed_origins)?))
    }

    /// The broker.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and serve in a background task.
    pub async fn start(self) -> Result<ServerHandle> {
        let router = self.router()?;
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let token = self.shutdown.token();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(%addr, "vox relay listening");
        Ok(ServerHandle {
            addr,
            broker: self.broker,
            shutdown: self.shutdown,
            task,
        })
    }
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    broker: Arc<Broker>,
    shutdown: Arc<ShutdownCoordinator>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The broker behind this server.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Stop accepting, close every connection, and wait up to `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown.shutdown();
        self.broker.shutdown().await;
        self.shutdown.drain(self.task, timeout).await;
        info!("vox relay stopped");
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).map_err(|_| ServerError::InvalidOrigin(o.clone())))
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broker.connections().count().await;
    let slots = state.broker.registry().snapshot();
    Json(health::health_check(state.start_time, connections, &slots))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
