//! Checks file: which probes to register and which webhooks to notify
//!
//! ```toml
//! [[check]]
//! name = "api"
//! kind = "http"
//! url = "https://example.com/health"
//! timeout = "5s"
//! failure_status = "degraded"
//! tags = ["ready"]
//!
//! [[webhook]]
//! name = "ops"
//! url = "https://hooks.example.com/x"
//! payload = '{"text": "[[LIVENESS]] is failing"}'
//! ```

use crate::check::{CheckRegistration, Registry, Status};
use crate::config::{parse_duration, ConfigError};
use crate::probes::{DnsProbe, HttpProbe, TcpProbe};
use crate::report::WebhookConfig;
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChecksFile {
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckSpec>,
    #[serde(default, rename = "webhook")]
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    /// Duration string, e.g. "5s"
    pub timeout: Option<String>,
    /// healthy, degraded or unhealthy (default unhealthy)
    pub failure_status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub probe: ProbeSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeSpec {
    Http {
        url: String,
        method: Option<String>,
        /// Inclusive `[min, max]`
        expected_status: Option<(u16, u16)>,
        expected_content: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Tcp {
        host: String,
        port: u16,
    },
    Dns {
        host: String,
        min_addresses: Option<usize>,
    },
}

impl ChecksFile {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Build a registry with one registration per check
    ///
    /// HTTP probes share `client`. Fails on the first invalid check or
    /// duplicate name.
    pub fn to_registry(&self, client: &reqwest::Client) -> Result<Registry, ConfigError> {
        let mut registry = Registry::new();
        for spec in &self.checks {
            registry.register(spec.to_registration(client)?)?;
            debug!(check = %spec.name, "Registered health check");
        }
        Ok(registry)
    }
}

impl CheckSpec {
    pub fn to_registration(
        &self,
        client: &reqwest::Client,
    ) -> Result<CheckRegistration, ConfigError> {
        let field = |name: &str| format!("check '{}' {}", self.name, name);

        let registration = match &self.probe {
            ProbeSpec::Http {
                url,
                method,
                expected_status,
                expected_content,
                headers,
            } => {
                let mut probe = HttpProbe::new(url.clone()).with_client(client.clone());
                if let Some(method) = method {
                    let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                        .map_err(|e| {
                            ConfigError::invalid(field("method"), method.clone(), e.to_string())
                        })?;
                    probe = probe.with_method(parsed);
                }
                if let Some((min, max)) = *expected_status {
                    if min > max {
                        return Err(ConfigError::invalid(
                            field("expected_status"),
                            format!("[{}, {}]", min, max),
                            "min must not exceed max",
                        ));
                    }
                    probe = probe.with_expected_status(min, max);
                }
                if let Some(content) = expected_content {
                    probe = probe.with_expected_content(content.clone());
                }
                for (name, value) in headers {
                    probe = probe.with_header(name.clone(), value.clone());
                }
                CheckRegistration::from_probe(self.name.clone(), probe)
            }
            ProbeSpec::Tcp { host, port } => {
                CheckRegistration::from_probe(self.name.clone(), TcpProbe::new(host.clone(), *port))
            }
            ProbeSpec::Dns {
                host,
                min_addresses,
            } => {
                let probe =
                    DnsProbe::new(host.clone()).with_min_addresses(min_addresses.unwrap_or(1));
                CheckRegistration::from_probe(self.name.clone(), probe)
            }
        };

        let mut registration = registration.with_tags(self.tags.iter().cloned());

        if let Some(timeout) = &self.timeout {
            let parsed = parse_duration(timeout).ok_or_else(|| {
                ConfigError::invalid(
                    field("timeout"),
                    timeout.clone(),
                    "expected a duration like 5s",
                )
            })?;
            registration = registration.with_timeout(parsed);
        }

        if let Some(status) = &self.failure_status {
            let parsed: Status = status
                .parse()
                .map_err(|e: crate::check::status::ParseStatusError| {
                    ConfigError::invalid(field("failure_status"), status.clone(), e.to_string())
                })?;
            registration = registration.with_failure_status(parsed);
        }

        Ok(registration)
    }
}

#[cfg(test)]
#[path = "checks_test.rs"]
mod tests;
