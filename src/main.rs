use checkup::check::{Evaluator, Registry};
use checkup::config::{ChecksFile, Settings};
use checkup::publish::{Publisher, PublisherConfig, PublisherLoop};
use checkup::report::{
    create_metrics, PushgatewayPublisher, SharedMetrics, WebhookConfig, WebhookNotifier,
};
use checkup::server::{
    run_health_server, shutdown_channel, wait_for_signal, ReadinessState, ServerState,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Load the checks file, treating a missing file as "no checks"
fn load_checks(path: &Path) -> anyhow::Result<ChecksFile> {
    if !path.exists() {
        warn!(path = %path.display(), "Checks file not found - starting with no checks");
        return Ok(ChecksFile::default());
    }
    let file = ChecksFile::load(path)?;
    info!(
        path = %path.display(),
        checks = file.checks.len(),
        webhooks = file.webhooks.len(),
        "Checks file loaded"
    );
    Ok(file)
}

/// Evaluator shared by `/health` and the publisher loop
fn build_evaluator(settings: &Settings, registry: Registry) -> Arc<Evaluator> {
    Arc::new(Evaluator::new(Arc::new(registry)).with_default_timeout(settings.default_timeout))
}

fn publisher_config(settings: &Settings) -> PublisherConfig {
    PublisherConfig {
        delay: settings.publish_delay,
        period: settings.publish_period,
        timeout: settings.evaluation_timeout,
        ..PublisherConfig::default()
    }
}

/// Publishers fed by the periodic loop
///
/// The `/metrics` gauges are always updated; the Pushgateway and webhooks
/// only when configured.
fn build_publishers(
    settings: &Settings,
    webhooks: Vec<WebhookConfig>,
    metrics: SharedMetrics,
    client: &reqwest::Client,
) -> anyhow::Result<Vec<Arc<dyn Publisher>>> {
    let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
    publishers.push(metrics);

    if let Some(url) = &settings.pushgateway_url {
        let pushgateway = PushgatewayPublisher::new(
            url,
            &settings.pushgateway_job,
            settings.pushgateway_instance.as_deref(),
        )?
        .with_client(client.clone());
        info!(url = %pushgateway.url(), "Pushgateway publisher configured");
        publishers.push(Arc::new(pushgateway));
    } else {
        info!("Pushgateway URL not configured - push disabled");
    }

    if !webhooks.is_empty() {
        info!(webhooks = webhooks.len(), "Webhook notifications configured");
        let notifier = WebhookNotifier::new(
            settings.name.clone(),
            webhooks,
            settings.min_notification_interval,
        )
        .with_client(client.clone());
        publishers.push(Arc::new(notifier));
    }

    Ok(publishers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting checkup health service");

    let settings = Settings::from_env()?;
    let client = reqwest::Client::new();

    let checks = load_checks(&settings.checks_file)?;
    let registry = checks.to_registry(&client)?;
    let evaluator = build_evaluator(&settings, registry);

    // Create shutdown channel for coordinated shutdown
    let (shutdown_controller, shutdown_signal) = shutdown_channel();

    // Create readiness state (initially not ready)
    let readiness = ReadinessState::new();

    let metrics = create_metrics()?;
    info!("Prometheus metrics registry initialized");

    // Start HTTP server in background
    let state = ServerState::new(readiness.clone(), metrics.clone(), evaluator.clone())
        .with_request_timeout(settings.evaluation_timeout);
    let port = settings.port;
    let server_signal = shutdown_signal.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = run_health_server(port, state, server_signal).await {
            error!(error = %e, "Health server failed");
        }
    });

    // Start publisher loop in background
    let mut publisher_loop = PublisherLoop::new(evaluator, publisher_config(&settings));
    for publisher in build_publishers(&settings, checks.webhooks, metrics, &client)? {
        publisher_loop = publisher_loop.with_publisher(publisher);
    }
    let publisher_signal = shutdown_signal.clone();
    let publisher_handle = tokio::spawn(async move { publisher_loop.run(publisher_signal).await });

    readiness.set_ready();
    info!(port = port, "checkup ready");

    match wait_for_signal().await {
        Ok(signal) => info!(signal = signal, "Initiating graceful shutdown"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signals - shutting down"),
    }
    // Mark not ready so traffic drains during shutdown
    readiness.set_not_ready();

    // Trigger shutdown for all components
    shutdown_controller.shutdown();

    info!("Stopping components...");
    if let Err(e) = publisher_handle.await {
        warn!(error = %e, "Publisher loop ended abnormally");
    }
    if let Err(e) = server_handle.await {
        warn!(error = %e, "Health server ended abnormally");
    }

    info!("checkup shut down gracefully");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
