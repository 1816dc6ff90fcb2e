//! Prometheus metrics for health reports
//!
//! Metrics exposed:
//! - `healthcheck{healthcheck}` - status per check (Unhealthy=0, Degraded=1, Healthy=2)
//! - `healthcheck_duration_seconds{healthcheck}` - duration of the last run per check
//! - `healthcheck_overall` - overall status, same encoding
//! - `healthcheck_total_duration_seconds` - wall clock of the last evaluation
//! - `healthcheck_evaluations_total` - number of reports recorded

use crate::check::AggregateReport;
use crate::publish::{PublishError, Publisher};
use async_trait::async_trait;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type SharedMetrics = Arc<CheckMetrics>;

/// Gauges for the most recent report, in a private registry
pub struct CheckMetrics {
    registry: Registry,
    check_status: GaugeVec,
    check_duration: GaugeVec,
    overall_status: Gauge,
    total_duration: Gauge,
    evaluations: IntCounter,
    /// Check names currently present in the labelled gauges
    known: Mutex<BTreeSet<String>>,
}

impl CheckMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let check_status = GaugeVec::new(
            Opts::new(
                "healthcheck",
                "Health check status (0=Unhealthy, 1=Degraded, 2=Healthy)",
            ),
            &["healthcheck"],
        )?;
        let check_duration = GaugeVec::new(
            Opts::new(
                "healthcheck_duration_seconds",
                "Duration of the last health check run in seconds",
            ),
            &["healthcheck"],
        )?;
        let overall_status = Gauge::with_opts(Opts::new(
            "healthcheck_overall",
            "Overall health status (0=Unhealthy, 1=Degraded, 2=Healthy)",
        ))?;
        let total_duration = Gauge::with_opts(Opts::new(
            "healthcheck_total_duration_seconds",
            "Wall-clock duration of the last evaluation in seconds",
        ))?;
        let evaluations = IntCounter::with_opts(Opts::new(
            "healthcheck_evaluations_total",
            "Number of health reports recorded",
        ))?;

        registry.register(Box::new(check_status.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;
        registry.register(Box::new(overall_status.clone()))?;
        registry.register(Box::new(total_duration.clone()))?;
        registry.register(Box::new(evaluations.clone()))?;

        Ok(Self {
            registry,
            check_status,
            check_duration,
            overall_status,
            total_duration,
            evaluations,
            known: Mutex::new(BTreeSet::new()),
        })
    }

    /// Replace the exported values with those of `report`
    ///
    /// Checks missing from `report` lose their series.
    pub fn record_report(&self, report: &AggregateReport) {
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());

        for stale in known.iter().filter(|name| !report.entries.contains_key(*name)) {
            let _ = self.check_status.remove_label_values(&[stale.as_str()]);
            let _ = self.check_duration.remove_label_values(&[stale.as_str()]);
        }
        known.clear();

        for (name, outcome) in &report.entries {
            self.check_status
                .with_label_values(&[name.as_str()])
                .set(outcome.status.metric_value());
            self.check_duration
                .with_label_values(&[name.as_str()])
                .set(outcome.duration.as_secs_f64());
            known.insert(name.clone());
        }

        self.overall_status.set(report.overall_status.metric_value());
        self.total_duration.set(report.total_duration.as_secs_f64());
        self.evaluations.inc();

        debug!(checks = known.len(), status = %report.overall_status, "Recorded health metrics");
    }

    /// Prometheus text exposition of every metric
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create the shared metrics served by `/metrics`
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(CheckMetrics::new()?))
}

#[async_trait]
impl Publisher for CheckMetrics {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    async fn publish(&self, report: &AggregateReport) -> Result<(), PublishError> {
        self.record_report(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckOutcome, Status};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn report(entries: &[(&str, Status)]) -> AggregateReport {
        let entries: BTreeMap<String, CheckOutcome> = entries
            .iter()
            .map(|(name, status)| {
                let mut outcome = CheckOutcome::new(*status);
                outcome.duration = Duration::from_millis(250);
                (name.to_string(), outcome)
            })
            .collect();
        AggregateReport::new(entries, Duration::from_millis(300), Utc::now())
    }

    #[test]
    fn test_fresh_registry_encodes() {
        let metrics = create_metrics().unwrap();
        let body = metrics.encode().unwrap();

        // Unlabelled metrics appear with their zero value
        assert!(body.contains("healthcheck_overall 0"));
        assert!(body.contains("healthcheck_evaluations_total 0"));
    }

    #[test]
    fn test_record_report_uses_fixed_encoding() {
        // ARRANGE
        let metrics = create_metrics().unwrap();

        // ACT
        metrics.record_report(&report(&[
            ("cache", Status::Degraded),
            ("db", Status::Healthy),
            ("queue", Status::Unhealthy),
        ]));
        let body = metrics.encode().unwrap();

        // ASSERT
        assert!(body.contains(r#"healthcheck{healthcheck="cache"} 1"#));
        assert!(body.contains(r#"healthcheck{healthcheck="db"} 2"#));
        assert!(body.contains(r#"healthcheck{healthcheck="queue"} 0"#));
        assert!(body.contains(r#"healthcheck_duration_seconds{healthcheck="db"} 0.25"#));
        assert!(body.contains("healthcheck_overall 0"));
        assert!(body.contains("healthcheck_total_duration_seconds 0.3"));
        assert!(body.contains("healthcheck_evaluations_total 1"));
    }

    #[test]
    fn test_removed_checks_drop_their_series() {
        let metrics = create_metrics().unwrap();
        metrics.record_report(&report(&[("db", Status::Healthy), ("old", Status::Healthy)]));

        metrics.record_report(&report(&[("db", Status::Healthy)]));
        let body = metrics.encode().unwrap();

        assert!(!body.contains(r#"healthcheck="old""#));
        assert!(body.contains(r#"healthcheck{healthcheck="db"} 2"#));
        assert!(body.contains("healthcheck_overall 2"));
        assert!(body.contains("healthcheck_evaluations_total 2"));
    }

    #[tokio::test]
    async fn test_publisher_records_report() {
        let metrics = create_metrics().unwrap();

        metrics
            .publish(&report(&[("db", Status::Degraded)]))
            .await
            .unwrap();

        assert!(metrics
            .encode()
            .unwrap()
            .contains(r#"healthcheck{healthcheck="db"} 1"#));
    }
}
