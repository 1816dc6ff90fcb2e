//! Three-valued health status with worst-wins ordering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health of a single check or of a whole report
///
/// Variants are declared best-first so the derived `Ord` gives
/// `Healthy < Degraded < Unhealthy`. The ordering exists only to pick the
/// worst status of a set.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Status {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    /// Numeric encoding used by every metrics reporter
    ///
    /// Unhealthy = 0, Degraded = 1, Healthy = 2. Higher is better, so a
    /// dashboard threshold of `< 2` catches anything not fully healthy.
    pub fn metric_value(self) -> f64 {
        match self {
            Status::Unhealthy => 0.0,
            Status::Degraded => 1.0,
            Status::Healthy => 2.0,
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Status::Healthy
    }

    /// Worst status in `statuses`, or `Healthy` when there are none
    pub fn worst<I>(statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        statuses.into_iter().max().unwrap_or(Status::Healthy)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Healthy => write!(f, "Healthy"),
            Status::Degraded => write!(f, "Degraded"),
            Status::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Error returned when a status string is not recognised
#[derive(Debug, thiserror::Error)]
#[error("unknown status '{0}', expected healthy, degraded or unhealthy")]
pub struct ParseStatusError(String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(Status::Healthy),
            "degraded" => Ok(Status::Degraded),
            "unhealthy" => Ok(Status::Unhealthy),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}
