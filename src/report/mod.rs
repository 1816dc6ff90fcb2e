//! Reporters turning an `AggregateReport` into something outside can consume
//!
//! - `StatusCodes`: HTTP status per overall status
//! - `ui`: JSON body served by `/health`
//! - `metrics`: Prometheus gauges served by `/metrics`
//! - `pushgateway`: pushes the same gauges to a Pushgateway
//! - `webhook`: failure / restore notifications

pub mod metrics;
pub mod pushgateway;
pub mod ui;
pub mod webhook;

pub use metrics::{create_metrics, CheckMetrics, SharedMetrics};
pub use pushgateway::PushgatewayPublisher;
pub use ui::{UiEntry, UiReport};
pub use webhook::{WebhookConfig, WebhookNotifier};

use crate::check::Status;

/// HTTP status code returned for each overall status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodes {
    pub healthy: u16,
    pub degraded: u16,
    pub unhealthy: u16,
}

impl Default for StatusCodes {
    /// Degraded still serves traffic, so only Unhealthy maps to 503
    fn default() -> Self {
        Self {
            healthy: 200,
            degraded: 200,
            unhealthy: 503,
        }
    }
}

impl StatusCodes {
    pub fn for_status(&self, status: Status) -> u16 {
        match status {
            Status::Healthy => self.healthy,
            Status::Degraded => self.degraded,
            Status::Unhealthy => self.unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_codes() {
        let codes = StatusCodes::default();
        assert_eq!(codes.for_status(Status::Healthy), 200);
        assert_eq!(codes.for_status(Status::Degraded), 200);
        assert_eq!(codes.for_status(Status::Unhealthy), 503);
    }

    #[test]
    fn test_custom_status_codes() {
        let codes = StatusCodes {
            degraded: 207,
            ..StatusCodes::default()
        };
        assert_eq!(codes.for_status(Status::Degraded), 207);
    }
}
