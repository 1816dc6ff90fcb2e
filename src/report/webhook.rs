//! Webhook failure and restore notifications
//!
//! A non-healthy report sends the "down" payload of every configured webhook.
//! The first healthy report after a non-healthy one sends the "restore"
//! payload. A notification of the same kind as the previous one is suppressed
//! while it falls inside `min_interval`.
//!
//! Payload bookmarks:
//! - `[[LIVENESS]]` - name of the monitored service
//! - `[[FAILURE]]` - "There are at least {n} HealthChecks failing."
//! - `[[DESCRIPTIONS]]` - failing descriptions joined with " | "
//!
//! Substituted values are escaped as JSON string contents, so bookmarks
//! belong inside quoted strings of a JSON payload.

use crate::check::clock::{Clock, SystemClock};
use crate::check::{AggregateReport, Status};
use crate::publish::{PublishError, Publisher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const LIVENESS_BOOKMARK: &str = "[[LIVENESS]]";
pub const FAILURE_BOOKMARK: &str = "[[FAILURE]]";
pub const DESCRIPTIONS_BOOKMARK: &str = "[[DESCRIPTIONS]]";

/// One webhook target as written in the checks file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    /// Body sent when the service goes down
    pub payload: String,
    /// Body sent when the service recovers
    #[serde(default)]
    pub restore_payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Down,
    Restored,
}

#[derive(Debug, Default)]
struct LivenessState {
    last_status: Option<Status>,
    last_notification: Option<(NotificationKind, DateTime<Utc>)>,
}

pub struct WebhookNotifier {
    liveness: String,
    webhooks: Vec<WebhookConfig>,
    min_interval: Duration,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    state: Mutex<HashMap<String, LivenessState>>,
}

impl WebhookNotifier {
    /// Notifier publishing reports under the name `liveness`
    pub fn new(
        liveness: impl Into<String>,
        webhooks: Vec<WebhookConfig>,
        min_interval: Duration,
    ) -> Self {
        Self {
            liveness: liveness.into(),
            webhooks,
            min_interval,
            client: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record `status` for `name` and decide which notification, if any, is due
    ///
    /// Returns `None` when nothing changed or the notification is throttled.
    pub fn decide(&self, name: &str, status: Status) -> Option<NotificationKind> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.entry(name.to_lowercase()).or_default();

        let previous = entry.last_status.replace(status);
        let kind = if !status.is_healthy() {
            NotificationKind::Down
        } else if previous.is_some_and(|p| !p.is_healthy()) {
            NotificationKind::Restored
        } else {
            return None;
        };

        if let Some((last_kind, at)) = entry.last_notification {
            let elapsed = (now - at).to_std().unwrap_or(Duration::ZERO);
            if last_kind == kind && elapsed < self.min_interval {
                info!(
                    liveness = %name,
                    kind = ?kind,
                    "Notification already sent within the minimum interval"
                );
                return None;
            }
        }

        entry.last_notification = Some((kind, now));
        Some(kind)
    }

    /// Send the notification for `report` to every webhook
    ///
    /// Delivery failures are logged per webhook and do not stop the others.
    pub async fn notify(&self, name: &str, report: &AggregateReport) -> Option<NotificationKind> {
        let kind = self.decide(name, report.overall_status)?;

        for webhook in &self.webhooks {
            let template = match kind {
                NotificationKind::Down => &webhook.payload,
                NotificationKind::Restored => &webhook.restore_payload,
            };
            let payload = render(template, name, kind, report);

            match self.send(webhook, payload).await {
                Ok(()) => debug!(webhook = %webhook.name, kind = ?kind, "Webhook notified"),
                Err(e) => warn!(
                    webhook = %webhook.name,
                    error = %e,
                    "Webhook notification failed"
                ),
            }
        }

        Some(kind)
    }

    async fn send(&self, webhook: &WebhookConfig, payload: String) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&webhook.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PublishError::Rejected {
                target: webhook.name.clone(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Fill the bookmarks of `template`
///
/// Restore notifications leave the failure bookmarks empty.
pub fn render(
    template: &str,
    name: &str,
    kind: NotificationKind,
    report: &AggregateReport,
) -> String {
    let (failure, descriptions) = match kind {
        NotificationKind::Down => {
            let failing: Vec<_> = report.failing().collect();
            let descriptions = failing
                .iter()
                .filter_map(|(_, outcome)| {
                    outcome.description.as_deref().or(outcome.error.as_deref())
                })
                .collect::<Vec<_>>()
                .join(" | ");
            (
                format!("There are at least {} HealthChecks failing.", failing.len()),
                descriptions,
            )
        }
        NotificationKind::Restored => (String::new(), String::new()),
    };

    template
        .replace(LIVENESS_BOOKMARK, &json_escape(name))
        .replace(FAILURE_BOOKMARK, &json_escape(&failure))
        .replace(DESCRIPTIONS_BOOKMARK, &json_escape(&descriptions))
}

/// `value` encoded as the inside of a JSON string literal
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[async_trait]
impl Publisher for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, report: &AggregateReport) -> Result<(), PublishError> {
        self.notify(&self.liveness, report).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
