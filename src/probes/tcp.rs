//! TCP connect probe

use crate::check::{CheckContext, CheckOutcome, Probe, ProbeError};
use async_trait::async_trait;
use tokio::net::TcpStream;

/// Healthy when a TCP connection to `host:port` can be opened
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, ProbeError> {
        let stream = tokio::select! {
            _ = ctx.cancelled() => return Err(ProbeError::Cancelled),
            stream = TcpStream::connect((self.host.as_str(), self.port)) => stream?,
        };

        let peer = stream.peer_addr()?;
        Ok(CheckOutcome::healthy().with_data("address", peer.to_string()))
    }
}
