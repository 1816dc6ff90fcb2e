//! Push health metrics to a Prometheus Pushgateway
//!
//! Each publish records the report into a private `CheckMetrics` and POSTs
//! its text exposition to `{endpoint}/metrics/job/{job}[/instance/{instance}]`.

use crate::check::AggregateReport;
use crate::publish::{PublishError, Publisher};
use crate::report::CheckMetrics;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct PushgatewayPublisher {
    client: reqwest::Client,
    url: Url,
    metrics: CheckMetrics,
}

impl PushgatewayPublisher {
    /// # Errors
    /// `InvalidEndpoint` when `endpoint` is not an absolute http(s) URL,
    /// `Encode` if the metrics registry cannot be built
    pub fn new(endpoint: &str, job: &str, instance: Option<&str>) -> Result<Self, PublishError> {
        let invalid = || PublishError::InvalidEndpoint(endpoint.to_string());

        let mut url = Url::parse(endpoint).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || job.is_empty() {
            return Err(invalid());
        }
        {
            let mut segments = url.path_segments_mut().map_err(|_| invalid())?;
            segments.pop_if_empty().extend(["metrics", "job", job]);
            if let Some(instance) = instance.filter(|i| !i.is_empty()) {
                segments.extend(["instance", instance]);
            }
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            metrics: CheckMetrics::new()?,
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Publisher for PushgatewayPublisher {
    fn name(&self) -> &'static str {
        "pushgateway"
    }

    async fn publish(&self, report: &AggregateReport) -> Result<(), PublishError> {
        self.metrics.record_report(report);
        let body = self.metrics.encode()?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, TEXT_FORMAT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                target: self.url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.url, "Pushed health metrics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckOutcome, Status};
    use axum::{extract::State, http::StatusCode, http::Uri, Router};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;

    type Pushes = Arc<Mutex<Vec<(String, String)>>>;

    /// Fake Pushgateway recording (path, body) of every request
    async fn spawn_gateway(reply: StatusCode) -> (String, Pushes) {
        let pushes: Pushes = Arc::default();
        let app = Router::new()
            .fallback(move |State(pushes): State<Pushes>, uri: Uri, body: String| async move {
                pushes.lock().unwrap().push((uri.path().to_string(), body));
                reply
            })
            .with_state(pushes.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), pushes)
    }

    fn report() -> AggregateReport {
        AggregateReport::new(
            BTreeMap::from([("db".to_string(), CheckOutcome::new(Status::Degraded))]),
            Duration::from_millis(10),
            Utc::now(),
        )
    }

    #[test]
    fn test_url_layout() {
        let with_instance =
            PushgatewayPublisher::new("http://gateway:9091/", "checkup", Some("pod-1")).unwrap();
        assert_eq!(
            with_instance.url().as_str(),
            "http://gateway:9091/metrics/job/checkup/instance/pod-1"
        );

        let without = PushgatewayPublisher::new("http://gateway:9091", "my job", None).unwrap();
        assert_eq!(
            without.url().as_str(),
            "http://gateway:9091/metrics/job/my%20job"
        );
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        for endpoint in ["gateway:9091", "ftp://gateway", "not a url"] {
            let result = PushgatewayPublisher::new(endpoint, "checkup", None);
            assert!(
                matches!(result, Err(PublishError::InvalidEndpoint(_))),
                "{} should be rejected",
                endpoint
            );
        }
        assert!(PushgatewayPublisher::new("http://gateway", "", None).is_err());
    }

    #[tokio::test]
    async fn test_publish_posts_exposition() {
        // ARRANGE
        let (base, pushes) = spawn_gateway(StatusCode::OK).await;
        let publisher = PushgatewayPublisher::new(&base, "checkup", Some("a")).unwrap();

        // ACT
        publisher.publish(&report()).await.unwrap();

        // ASSERT
        let pushes = pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "/metrics/job/checkup/instance/a");
        assert!(pushes[0].1.contains(r#"healthcheck{healthcheck="db"} 1"#));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, _pushes) = spawn_gateway(StatusCode::BAD_REQUEST).await;
        let publisher = PushgatewayPublisher::new(&base, "checkup", None).unwrap();

        let result = publisher.publish(&report()).await;

        match result {
            Err(PublishError::Rejected { status, .. }) => assert_eq!(status, 400),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }
}
