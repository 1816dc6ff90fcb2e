//! Periodic evaluation and delivery of reports to publishers
//!
//! The loop waits `delay`, then every `period` evaluates the selected checks
//! (bounded by `timeout`) and hands the report to every publisher
//! concurrently. A failing publisher is logged and the loop carries on.

use crate::check::{AggregateReport, EvaluationError, EvaluationOptions, Evaluator, Selector};
use crate::server::ShutdownSignal;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{target} rejected the report with status {status}: {body}")]
    Rejected {
        target: String,
        status: u16,
        body: String,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Destination for evaluated reports
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn publish(&self, report: &AggregateReport) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Wait before the first evaluation
    pub delay: Duration,
    /// Interval between evaluations (must be non-zero)
    pub period: Duration,
    /// Overall deadline of each evaluation
    pub timeout: Duration,
    pub selector: Selector,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            period: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            selector: Selector::All,
        }
    }
}

pub struct PublisherLoop {
    evaluator: Arc<Evaluator>,
    publishers: Vec<Arc<dyn Publisher>>,
    config: PublisherConfig,
}

impl PublisherLoop {
    pub fn new(evaluator: Arc<Evaluator>, config: PublisherConfig) -> Self {
        Self {
            evaluator,
            publishers: Vec::new(),
            config,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn publisher_names(&self) -> Vec<&'static str> {
        self.publishers.iter().map(|p| p.name()).collect()
    }

    /// Evaluate once and deliver the report to every publisher
    ///
    /// Publisher failures are logged, not returned. Only a cancelled
    /// evaluation is an error, and then nothing is published.
    pub async fn run_once(&self) -> Result<AggregateReport, EvaluationError> {
        let options = EvaluationOptions::default().with_deadline(self.config.timeout);
        let report = self
            .evaluator
            .evaluate(&self.config.selector, options)
            .await?;

        debug!(
            status = %report.overall_status,
            checks = report.entries.len(),
            publishers = self.publishers.len(),
            "Publishing health report"
        );

        let results = join_all(self.publishers.iter().map(|publisher| {
            let report = &report;
            async move { (publisher.name(), publisher.publish(report).await) }
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                warn!(publisher = name, error = %e, "Failed to publish health report");
            }
        }

        Ok(report)
    }

    /// Run until shutdown is signalled
    ///
    /// An evaluation in flight when shutdown arrives is dropped, which aborts
    /// its check tasks.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        let mut ticker = interval_at(Instant::now() + self.config.delay, self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            delay_ms = self.config.delay.as_millis() as u64,
            period_ms = self.config.period.as_millis() as u64,
            publishers = ?self.publisher_names(),
            "Publisher loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                result = self.run_once() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Health report not published");
                    }
                }
            }
        }

        info!("Publisher loop stopped");
    }
}

#[cfg(test)]
#[path = "publish_test.rs"]
mod tests;
