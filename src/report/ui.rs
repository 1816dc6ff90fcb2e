//! JSON report served to dashboards
//!
//! Durations are written as `hh:mm:ss.fffffff` (a `d.` day prefix past 24h,
//! the fraction left out when zero) so existing health dashboards can read
//! the body without changes.

use crate::check::{AggregateReport, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Name of the single entry in a report built from an error
pub const ERROR_ENTRY: &str = "endpoint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiReport {
    pub status: Status,
    #[serde(with = "timespan")]
    pub total_duration: Duration,
    pub entries: BTreeMap<String, UiEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiEntry {
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    pub description: Option<String>,
    #[serde(with = "timespan")]
    pub duration: Duration,
    pub exception: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl UiReport {
    pub fn from_report(report: &AggregateReport) -> Self {
        let entries = report
            .entries
            .iter()
            .map(|(name, outcome)| {
                let entry = UiEntry {
                    data: outcome.data.clone(),
                    description: outcome
                        .description
                        .clone()
                        .or_else(|| outcome.error.clone()),
                    duration: outcome.duration,
                    exception: outcome.error.clone(),
                    status: outcome.status,
                    tags: outcome.tags.clone(),
                };
                (name.clone(), entry)
            })
            .collect();

        Self {
            status: report.overall_status,
            total_duration: report.total_duration,
            entries,
        }
    }

    /// Unhealthy report for an evaluation that produced no report at all
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let message = error.to_string();
        let entry = UiEntry {
            data: BTreeMap::new(),
            description: Some(message.clone()),
            duration: Duration::ZERO,
            exception: Some(message),
            status: Status::Unhealthy,
            tags: BTreeSet::new(),
        };

        Self {
            status: Status::Unhealthy,
            total_duration: Duration::ZERO,
            entries: BTreeMap::from([(ERROR_ENTRY.to_string(), entry)]),
        }
    }

    /// Entries that are not healthy, in name order
    pub fn failing(&self) -> impl Iterator<Item = (&String, &UiEntry)> {
        self.entries.iter().filter(|(_, e)| !e.status.is_healthy())
    }
}

/// `[d.]hh:mm:ss[.fffffff]` encoding of a `Duration`
pub mod timespan {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const TICKS_PER_SECOND: u64 = 10_000_000;
    const NANOS_PER_TICK: u32 = 100;

    pub fn format(duration: Duration) -> String {
        let total = duration.as_secs();
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;
        let ticks = duration.subsec_nanos() / NANOS_PER_TICK;

        let mut out = String::new();
        if days > 0 {
            out.push_str(&format!("{}.", days));
        }
        out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
        if ticks > 0 {
            out.push_str(&format!(".{:07}", ticks));
        }
        out
    }

    pub fn parse(s: &str) -> Option<Duration> {
        let (clock, fraction) = match s.rsplit_once('.') {
            // A dot after the last colon is the fraction; before it, the day prefix
            Some((head, tail)) if !tail.contains(':') => (head, Some(tail)),
            _ => (s, None),
        };
        let (days, clock) = match clock.split_once('.') {
            Some((days, rest)) => (days.parse::<u64>().ok()?, rest),
            None => (0, clock),
        };

        let mut parts = clock.split(':');
        let hours: u64 = parts.next()?.parse().ok()?;
        let minutes: u64 = parts.next()?.parse().ok()?;
        let seconds: u64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
            return None;
        }

        let nanos = match fraction {
            Some(f) if !f.is_empty() && f.len() <= 7 && f.bytes().all(|b| b.is_ascii_digit()) => {
                let ticks: u64 = format!("{:0<7}", f).parse().ok()?;
                (ticks % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK
            }
            Some(_) => return None,
            None => 0,
        };

        let secs = days * 86_400 + hours * 3_600 + minutes * 60 + seconds;
        Some(Duration::new(secs, nanos))
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| de::Error::custom(format!("invalid timespan '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckOutcome;
    use chrono::Utc;

    #[test]
    fn test_timespan_format() {
        assert_eq!(timespan::format(Duration::ZERO), "00:00:00");
        assert_eq!(timespan::format(Duration::from_millis(1500)), "00:00:01.5000000");
        assert_eq!(timespan::format(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(timespan::format(Duration::from_secs(90_061)), "1.01:01:01");
        assert_eq!(timespan::format(Duration::from_nanos(1_234)), "00:00:00.0000012");
    }

    #[test]
    fn test_timespan_parse() {
        assert_eq!(timespan::parse("00:00:01.5"), Some(Duration::from_millis(1500)));
        assert_eq!(timespan::parse("1.01:01:01"), Some(Duration::from_secs(90_061)));
        assert_eq!(
            timespan::parse("2.00:00:00.0000001"),
            Some(Duration::new(172_800, 100))
        );
        assert_eq!(timespan::parse("00:61:00"), None);
        assert_eq!(timespan::parse("garbage"), None);
    }

    #[test]
    fn test_from_report_falls_back_to_error_for_description() {
        // ARRANGE: one healthy entry and one that failed without a description
        let mut failed = CheckOutcome::new(Status::Degraded).with_error("connection refused");
        failed.duration = Duration::from_millis(20);
        failed.tags = BTreeSet::from(["ready".to_string()]);
        let described = CheckOutcome::unhealthy("replica lag").with_error("lag 40s");
        let entries = BTreeMap::from([
            ("api".to_string(), CheckOutcome::healthy()),
            ("cache".to_string(), failed),
            ("db".to_string(), described),
        ]);
        let report = AggregateReport::new(entries, Duration::from_millis(25), Utc::now());

        // ACT
        let ui = UiReport::from_report(&report);

        // ASSERT
        assert_eq!(ui.status, Status::Unhealthy);
        let cache = &ui.entries["cache"];
        assert_eq!(cache.description.as_deref(), Some("connection refused"));
        assert_eq!(cache.exception.as_deref(), Some("connection refused"));
        assert!(cache.tags.contains("ready"));
        assert_eq!(
            ui.entries["db"].description.as_deref(),
            Some("replica lag")
        );
        assert_eq!(ui.entries["api"].exception, None);
        assert_eq!(ui.failing().count(), 2);
    }

    #[test]
    fn test_json_shape() {
        let mut outcome = CheckOutcome::healthy().with_data("statusCode", 200);
        outcome.duration = Duration::from_millis(250);
        let report = AggregateReport::new(
            BTreeMap::from([("api".to_string(), outcome)]),
            Duration::from_millis(300),
            Utc::now(),
        );

        let json = serde_json::to_value(UiReport::from_report(&report)).unwrap();

        assert_eq!(json["status"], "Healthy");
        assert_eq!(json["totalDuration"], "00:00:00.3000000");
        assert_eq!(json["entries"]["api"]["duration"], "00:00:00.2500000");
        assert_eq!(json["entries"]["api"]["data"]["statusCode"], 200);
        assert!(json["entries"]["api"]["exception"].is_null());
    }

    #[test]
    fn test_from_error_has_single_endpoint_entry() {
        let err = crate::check::EvaluationError::Cancelled;

        let ui = UiReport::from_error(&err);

        assert_eq!(ui.status, Status::Unhealthy);
        assert_eq!(ui.total_duration, Duration::ZERO);
        assert_eq!(ui.entries.len(), 1);
        let entry = &ui.entries[ERROR_ENTRY];
        assert_eq!(entry.status, Status::Unhealthy);
        assert_eq!(entry.description, entry.exception);
        assert_eq!(entry.description.as_deref(), Some(err.to_string().as_str()));
    }

    #[test]
    fn test_deserializes_own_output() {
        let ui = UiReport::from_error(&crate::check::EvaluationError::Cancelled);
        let body = serde_json::to_string(&ui).unwrap();

        let parsed: UiReport = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed, ui);
    }
}
