//! Per-check outcomes and the aggregate report of one evaluation

use crate::check::Status;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Result of one probe invocation
///
/// Probes build these with the constructors below and leave `duration` and
/// `tags` alone; the evaluator stamps both when it records the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: Status,
    pub description: Option<String>,
    /// Captured failure detail, set whenever the probe errored, panicked or timed out
    pub error: Option<String>,
    pub data: BTreeMap<String, Value>,
    pub duration: Duration,
    pub tags: BTreeSet<String>,
}

impl CheckOutcome {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            description: None,
            error: None,
            data: BTreeMap::new(),
            duration: Duration::ZERO,
            tags: BTreeSet::new(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(Status::Healthy)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(Status::Degraded).with_description(description)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(Status::Unhealthy).with_description(description)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Combined result of one evaluation cycle
///
/// Entries are keyed by check name. The map is ordered so two reports over
/// the same registry list their entries identically regardless of which
/// check finished first.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub entries: BTreeMap<String, CheckOutcome>,
    /// Wall-clock time of the whole evaluation, not the sum of entry durations
    pub total_duration: Duration,
    pub overall_status: Status,
    pub checked_at: DateTime<Utc>,
}

impl AggregateReport {
    /// Build a report, deriving the overall status worst-wins from `entries`
    pub fn new(
        entries: BTreeMap<String, CheckOutcome>,
        total_duration: Duration,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let overall_status = Status::worst(entries.values().map(|e| e.status));
        Self {
            entries,
            total_duration,
            overall_status,
            checked_at,
        }
    }

    /// Entries whose status is not `Healthy`, in name order
    pub fn failing(&self) -> impl Iterator<Item = (&String, &CheckOutcome)> {
        self.entries.iter().filter(|(_, e)| !e.status.is_healthy())
    }
}
