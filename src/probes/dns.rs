//! DNS resolution probe

use crate::check::{CheckContext, CheckOutcome, Probe, ProbeError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Healthy when `host` resolves to at least `min_addresses` distinct IPs
pub struct DnsProbe {
    host: String,
    min_addresses: usize,
}

impl DnsProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            min_addresses: 1,
        }
    }

    pub fn with_min_addresses(mut self, min_addresses: usize) -> Self {
        self.min_addresses = min_addresses;
        self
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, ProbeError> {
        let resolved = tokio::select! {
            _ = ctx.cancelled() => return Err(ProbeError::Cancelled),
            resolved = tokio::net::lookup_host((self.host.as_str(), 0)) => resolved?,
        };

        let addresses: BTreeSet<IpAddr> = resolved.map(|addr| addr.ip()).collect();
        let listed: Vec<String> = addresses.iter().map(ToString::to_string).collect();

        if addresses.len() < self.min_addresses {
            return Ok(ctx
                .failure(format!(
                    "{} resolved to {} address(es), expected at least {}",
                    self.host,
                    addresses.len(),
                    self.min_addresses
                ))
                .with_data("addresses", listed));
        }

        Ok(CheckOutcome::healthy().with_data("addresses", listed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Status;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> CheckContext {
        CheckContext::new("dns", Status::Degraded, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_literal_address_resolves() {
        let outcome = DnsProbe::new("127.0.0.1").check(&ctx()).await.unwrap();

        assert_eq!(outcome.status, Status::Healthy);
        assert_eq!(outcome.data["addresses"], serde_json::json!(["127.0.0.1"]));
    }

    #[tokio::test]
    async fn test_too_few_addresses_uses_failure_status() {
        let outcome = DnsProbe::new("127.0.0.1")
            .with_min_addresses(3)
            .check(&ctx())
            .await
            .unwrap();

        assert_eq!(outcome.status, Status::Degraded);
        assert!(outcome
            .description
            .unwrap()
            .contains("expected at least 3"));
    }
}
