//! HTTP endpoint probe
//!
//! Sends one request and checks the response status against an expected
//! range, optionally comparing the body with an exact expected value.

use crate::check::{CheckContext, CheckOutcome, Probe, ProbeError};
use async_trait::async_trait;
use reqwest::Method;

/// Default accepted status range (any 2xx)
pub const DEFAULT_EXPECTED_STATUS: (u16, u16) = (200, 299);

pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    expected_status: (u16, u16),
    expected_content: Option<String>,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            expected_status: DEFAULT_EXPECTED_STATUS,
            expected_content: None,
        }
    }

    /// Reuse a shared client (connection pool) instead of a private one
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Accepted status codes, inclusive on both ends
    pub fn with_expected_status(mut self, min: u16, max: u16) -> Self {
        self.expected_status = (min, max);
        self
    }

    pub fn with_expected_content(mut self, content: impl Into<String>) -> Self {
        self.expected_content = Some(content.into());
        self
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, ProbeError> {
        let mut request = self.client.request(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(ProbeError::Cancelled),
            response = request.send() => response?,
        };

        let code = response.status().as_u16();
        let (min, max) = self.expected_status;
        if !(min..=max).contains(&code) {
            return Ok(ctx
                .failure(format!(
                    "Endpoint responded with {}, expected {}..={}",
                    code, min, max
                ))
                .with_data("statusCode", code));
        }

        if let Some(expected) = &self.expected_content {
            let body = tokio::select! {
                _ = ctx.cancelled() => return Err(ProbeError::Cancelled),
                body = response.text() => body?,
            };
            if body != *expected {
                return Ok(ctx
                    .failure(format!(
                        "The expected value '{}' was not found in the response body",
                        expected
                    ))
                    .with_data("statusCode", code));
            }
        }

        Ok(CheckOutcome::healthy().with_data("statusCode", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Status;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    /// Serve a tiny app on an ephemeral port and return its base URL
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { "pong" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn ctx() -> CheckContext {
        CheckContext::new("upstream", Status::Unhealthy, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_success_status_is_healthy() {
        let base = spawn_upstream().await;
        let probe = HttpProbe::new(format!("{}/ok", base));

        let outcome = probe.check(&ctx()).await.unwrap();

        assert_eq!(outcome.status, Status::Healthy);
        assert_eq!(outcome.data["statusCode"], serde_json::json!(200));
    }

    #[tokio::test]
    async fn test_unexpected_status_uses_failure_status() {
        let base = spawn_upstream().await;
        let probe = HttpProbe::new(format!("{}/broken", base));

        let outcome = probe.check(&ctx()).await.unwrap();

        assert_eq!(outcome.status, Status::Unhealthy);
        assert_eq!(
            outcome.description.as_deref(),
            Some("Endpoint responded with 500, expected 200..=299")
        );
    }

    #[tokio::test]
    async fn test_expected_status_range_is_configurable() {
        let base = spawn_upstream().await;
        let probe = HttpProbe::new(format!("{}/broken", base)).with_expected_status(200, 599);

        let outcome = probe.check(&ctx()).await.unwrap();

        assert_eq!(outcome.status, Status::Healthy);
    }

    #[tokio::test]
    async fn test_expected_content() {
        let base = spawn_upstream().await;

        let matching = HttpProbe::new(format!("{}/ok", base)).with_expected_content("pong");
        assert_eq!(
            matching.check(&ctx()).await.unwrap().status,
            Status::Healthy
        );

        let mismatched = HttpProbe::new(format!("{}/ok", base)).with_expected_content("ping");
        let outcome = mismatched.check(&ctx()).await.unwrap();
        assert_eq!(outcome.status, Status::Unhealthy);
        assert!(outcome.description.unwrap().contains("'ping'"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(format!("http://{}/ok", addr));
        let result = probe.check(&ctx()).await;

        assert!(matches!(result, Err(ProbeError::Http(_))));
    }
}
