//! Tests for the publisher loop

use super::*;
use crate::check::{CheckContext, CheckOutcome, CheckRegistration, ProbeError, Registry, Status};
use crate::probes::probe_fn;
use crate::server::shutdown_channel;
use std::sync::Mutex;

/// Records the overall status of every report it receives
#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<Status>>,
}

impl Recording {
    fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, report: &AggregateReport) -> Result<(), PublishError> {
        self.seen.lock().unwrap().push(report.overall_status);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl Publisher for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn publish(&self, _report: &AggregateReport) -> Result<(), PublishError> {
        Err(PublishError::InvalidEndpoint("nowhere".to_string()))
    }
}

fn evaluator_with(delay: Duration, status: Status) -> Arc<Evaluator> {
    let mut registry = Registry::new();
    registry
        .register(CheckRegistration::from_probe(
            "svc",
            probe_fn(move |_ctx: CheckContext| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ProbeError>(CheckOutcome::new(status))
            }),
        ))
        .unwrap();
    Arc::new(Evaluator::new(Arc::new(registry)))
}

fn fast_config() -> PublisherConfig {
    PublisherConfig {
        delay: Duration::from_millis(10),
        period: Duration::from_millis(30),
        timeout: Duration::from_secs(1),
        selector: Selector::All,
    }
}

#[tokio::test]
async fn test_run_once_reaches_every_publisher_despite_failures() {
    // ARRANGE
    let recording = Arc::new(Recording::default());
    let evaluator = evaluator_with(Duration::ZERO, Status::Degraded);
    let publishers = PublisherLoop::new(evaluator, fast_config())
        .with_publisher(Arc::new(Failing))
        .with_publisher(recording.clone());

    // ACT
    let report = publishers.run_once().await.unwrap();

    // ASSERT
    assert_eq!(report.overall_status, Status::Degraded);
    assert_eq!(*recording.seen.lock().unwrap(), vec![Status::Degraded]);
    assert_eq!(publishers.publisher_names(), vec!["failing", "recording"]);
}

#[tokio::test]
async fn test_run_once_timeout_publishes_nothing() {
    let recording = Arc::new(Recording::default());
    let config = PublisherConfig {
        timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let evaluator = evaluator_with(Duration::from_secs(10), Status::Healthy);
    let publishers = PublisherLoop::new(evaluator, config).with_publisher(recording.clone());

    let result = publishers.run_once().await;

    assert_eq!(result.err(), Some(EvaluationError::Cancelled));
    assert_eq!(recording.count(), 0);
}

#[tokio::test]
async fn test_loop_publishes_periodically_until_shutdown() {
    // ARRANGE
    let recording = Arc::new(Recording::default());
    let publishers = Arc::new(
        PublisherLoop::new(evaluator_with(Duration::ZERO, Status::Healthy), fast_config())
            .with_publisher(recording.clone()),
    );
    let (controller, signal) = shutdown_channel();

    // ACT
    let handle = {
        let publishers = publishers.clone();
        tokio::spawn(async move { publishers.run(signal).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    controller.shutdown();

    // ASSERT: loop exits promptly and has published more than once
    let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(joined.is_ok(), "publisher loop should stop on shutdown");
    assert!(
        recording.count() >= 2,
        "expected repeated publishes, got {}",
        recording.count()
    );
}

#[tokio::test]
async fn test_shutdown_before_first_tick() {
    let recording = Arc::new(Recording::default());
    let config = PublisherConfig {
        delay: Duration::from_secs(3600),
        ..fast_config()
    };
    let publishers = PublisherLoop::new(evaluator_with(Duration::ZERO, Status::Healthy), config)
        .with_publisher(recording.clone());
    let (controller, signal) = shutdown_channel();
    controller.shutdown();

    let finished = tokio::time::timeout(Duration::from_secs(1), publishers.run(signal)).await;

    assert!(finished.is_ok());
    assert_eq!(recording.count(), 0);
}

#[tokio::test]
async fn test_shutdown_interrupts_running_evaluation() {
    let recording = Arc::new(Recording::default());
    let config = PublisherConfig {
        delay: Duration::ZERO,
        timeout: Duration::from_secs(60),
        ..fast_config()
    };
    let publishers = Arc::new(
        PublisherLoop::new(evaluator_with(Duration::from_secs(30), Status::Healthy), config)
            .with_publisher(recording.clone()),
    );
    let (controller, signal) = shutdown_channel();

    let handle = {
        let publishers = publishers.clone();
        tokio::spawn(async move { publishers.run(signal).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.shutdown();

    let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(joined.is_ok());
    assert_eq!(recording.count(), 0);
}
