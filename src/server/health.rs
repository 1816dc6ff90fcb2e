//! HTTP endpoints of the checkup service
//!
//! - `/healthz` - Liveness: is the process alive?
//! - `/readyz` - Readiness: is the service started and not shutting down?
//! - `/health` - Evaluate checks and return the JSON report
//! - `/metrics` - Prometheus metrics of the last published report

use crate::check::{EvaluationOptions, Evaluator, Selector};
use crate::report::{SharedMetrics, StatusCodes, UiReport};
use crate::server::ShutdownSignal;
use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Default deadline of one `/health` evaluation
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared readiness flag
///
/// Set once the service has started; cleared again when shutdown begins.
#[derive(Debug, Clone)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Makes `/readyz` return 503 so traffic drains before exit
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined state for every endpoint
#[derive(Clone)]
pub struct ServerState {
    readiness: ReadinessState,
    metrics: SharedMetrics,
    evaluator: Arc<Evaluator>,
    status_codes: StatusCodes,
    request_timeout: Duration,
}

impl ServerState {
    pub fn new(
        readiness: ReadinessState,
        metrics: SharedMetrics,
        evaluator: Arc<Evaluator>,
    ) -> Self {
        Self {
            readiness,
            metrics,
            evaluator,
            status_codes: StatusCodes::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_status_codes(mut self, status_codes: StatusCodes) -> Self {
        self.status_codes = status_codes;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Liveness probe handler
///
/// Always returns 200 OK - if this responds, the process is alive.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
async fn readyz(State(state): State<ServerState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Evaluate the checks selected by `name` and `tag` query parameters
///
/// Without filters every check runs. Repeated parameters widen the
/// selection (`?tag=a&tag=b` runs checks tagged a or b).
async fn health(
    State(state): State<ServerState>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let mut names = Vec::new();
    let mut tags = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "name" => names.push(value),
            "tag" => tags.push(value),
            _ => {}
        }
    }
    let selector = Selector::from_filters(names, tags);
    let options = EvaluationOptions::default().with_deadline(state.request_timeout);

    let (code, body) = match state.evaluator.evaluate(&selector, options).await {
        Ok(report) => (
            state.status_codes.for_status(report.overall_status),
            UiReport::from_report(&report),
        ),
        Err(e) => {
            warn!(error = %e, "Health evaluation did not complete");
            (state.status_codes.unhealthy, UiReport::from_error(&e))
        }
    };

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (status, Json(body))
}

/// Prometheus metrics handler
async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        .route("/metrics", get(self::metrics))
        .with_state(state)
}

/// Serve every endpoint on `port` until `shutdown` fires
///
/// Open connections are drained before this returns.
pub async fn run_health_server(
    port: u16,
    state: ServerState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Health and metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
