//! Service configuration
//!
//! Runtime settings come from `CHECKUP_*` environment variables; the checks
//! and webhooks themselves come from a TOML file (see `checks`).

pub mod checks;

pub use checks::{CheckSpec, ChecksFile, ProbeSpec};

use crate::check::RegistryError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CHECKS_FILE: &str = "checkup.toml";
pub const DEFAULT_NAME: &str = "checkup";
/// Headroom between the per-check default timeout and the evaluation deadline
pub const EVALUATION_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse checks file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {field}: {reason}")]
    Invalid {
        field: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ConfigError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Name reported to webhooks as `[[LIVENESS]]`
    pub name: String,
    pub port: u16,
    pub checks_file: PathBuf,
    pub default_timeout: Duration,
    /// Deadline for one `/health` request or periodic evaluation
    ///
    /// Always longer than `default_timeout`, so a check that times out fails
    /// only its own entry.
    pub evaluation_timeout: Duration,
    pub publish_delay: Duration,
    pub publish_period: Duration,
    pub pushgateway_url: Option<String>,
    pub pushgateway_job: String,
    pub pushgateway_instance: Option<String>,
    pub min_notification_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: DEFAULT_PORT,
            checks_file: PathBuf::from(DEFAULT_CHECKS_FILE),
            default_timeout: Duration::from_secs(30),
            evaluation_timeout: Duration::from_secs(30) + EVALUATION_MARGIN,
            publish_delay: Duration::from_secs(5),
            publish_period: Duration::from_secs(30),
            pushgateway_url: None,
            pushgateway_job: DEFAULT_NAME.to_string(),
            pushgateway_instance: None,
            min_notification_interval: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let duration = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(value) => parse_duration(&value).ok_or_else(|| {
                    ConfigError::invalid(
                        key,
                        value,
                        "expected a non-zero duration like 30s, 5m or 2h",
                    )
                }),
                None => Ok(default),
            }
        };

        let defaults = Settings::default();

        let port = match get("CHECKUP_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("CHECKUP_PORT", value.clone(), e.to_string()))?,
            None => defaults.port,
        };

        let default_timeout = duration("CHECKUP_DEFAULT_TIMEOUT", defaults.default_timeout)?;
        let evaluation_timeout = duration(
            "CHECKUP_EVALUATION_TIMEOUT",
            default_timeout + EVALUATION_MARGIN,
        )?;
        if evaluation_timeout <= default_timeout {
            return Err(ConfigError::invalid(
                "CHECKUP_EVALUATION_TIMEOUT",
                format!("{}ms", evaluation_timeout.as_millis()),
                format!(
                    "must be longer than CHECKUP_DEFAULT_TIMEOUT ({}ms)",
                    default_timeout.as_millis()
                ),
            ));
        }

        Ok(Self {
            name: get("CHECKUP_NAME").unwrap_or(defaults.name),
            port,
            checks_file: get("CHECKUP_CHECKS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.checks_file),
            default_timeout,
            evaluation_timeout,
            publish_delay: duration("CHECKUP_PUBLISH_DELAY", defaults.publish_delay)?,
            publish_period: duration("CHECKUP_PUBLISH_PERIOD", defaults.publish_period)?,
            pushgateway_url: get("CHECKUP_PUSHGATEWAY_URL"),
            pushgateway_job: get("CHECKUP_PUSHGATEWAY_JOB").unwrap_or(defaults.pushgateway_job),
            pushgateway_instance: get("CHECKUP_PUSHGATEWAY_INSTANCE"),
            min_notification_interval: duration(
                "CHECKUP_MIN_NOTIFICATION_INTERVAL",
                defaults.min_notification_interval,
            )?,
        })
    }
}

/// Parse a duration string like "30s", "5m", "2h" or "250ms"
///
/// Zero and out-of-range values are rejected:
/// - ms: max 24h
/// - s: max 24h
/// - m: max 24h
/// - h: max 1 week
pub fn parse_duration(duration_str: &str) -> Option<Duration> {
    let duration_str = duration_str.trim();

    let (number_str, unit) = if let Some(number) = duration_str.strip_suffix("ms") {
        (number, "ms")
    } else {
        let unit = duration_str.get(duration_str.len().checked_sub(1)?..)?;
        (&duration_str[..duration_str.len() - 1], unit)
    };
    let number: u64 = number_str.parse().ok()?;

    if number == 0 {
        return None;
    }

    match unit {
        "ms" if number <= 86_400_000 => Some(Duration::from_millis(number)),
        "s" if number <= 86_400 => Some(Duration::from_secs(number)),
        "m" if number <= 1_440 => number.checked_mul(60).map(Duration::from_secs),
        "h" if number <= 168 => number.checked_mul(3_600).map(Duration::from_secs),
        _ => None,
    }
}
