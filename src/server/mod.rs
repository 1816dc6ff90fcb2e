//! HTTP server for health, report and metrics endpoints
//!
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (service is ready to serve)
//! - `/health` - On-demand evaluation with the JSON report
//! - `/metrics` - Prometheus text exposition
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod health;
pub mod shutdown;

pub use health::{
    build_router, run_health_server, ReadinessState, ServerState, DEFAULT_REQUEST_TIMEOUT,
};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
