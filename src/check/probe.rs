//! Probe capability and probe factories
//!
//! A probe tests one dependency. It is a single-method trait so vendor
//! probes, the built-in network probes and plain closures all plug into the
//! evaluator the same way.

use crate::check::{CheckOutcome, Services, Status};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Errors a probe (or its factory) can fail with
///
/// None of these reach the evaluation caller: the evaluator maps every one of
/// them to the registration's failure status.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("missing required dependency: {0}")]
    MissingDependency(&'static str),

    #[error("probe was cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProbeError::Failed(message.into())
    }
}

/// What a probe knows about the check it is running for
#[derive(Debug, Clone)]
pub struct CheckContext {
    name: String,
    failure_status: Status,
    cancel: CancellationToken,
}

impl CheckContext {
    pub fn new(name: impl Into<String>, failure_status: Status, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            failure_status,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status the registration asks for when this check fails
    pub fn failure_status(&self) -> Status {
        self.failure_status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the check timed out or the evaluation was cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Outcome with the registration's failure status and a description
    pub fn failure(&self, description: impl Into<String>) -> CheckOutcome {
        CheckOutcome::new(self.failure_status).with_description(description)
    }
}

/// Trait for a single health probe
///
/// Implementations should watch `ctx.cancelled()` around long waits. On
/// timeout the evaluator drops the probe future at its next `.await`, so a
/// probe that ignores cancellation is still bounded as long as it yields.
/// Blocking work (synchronous I/O, heavy computation) must go through
/// `tokio::task::spawn_blocking`; a probe that blocks its thread cannot be
/// timed out.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, ProbeError>;
}

/// Builds a probe for one evaluation
///
/// Factories are called once per check per evaluation. A factory that hands
/// out the same instance every time (see `SharedProbe`) shares it across
/// overlapping evaluations, which the `Send + Sync` bound on `Probe` permits;
/// probes with per-run state should be built fresh instead.
pub trait ProbeFactory: Send + Sync {
    fn create(&self, services: &Services) -> Result<Arc<dyn Probe>, ProbeError>;
}

impl<F> ProbeFactory for F
where
    F: Fn(&Services) -> Result<Arc<dyn Probe>, ProbeError> + Send + Sync,
{
    fn create(&self, services: &Services) -> Result<Arc<dyn Probe>, ProbeError> {
        self(services)
    }
}

/// Factory that returns one shared probe instance
pub struct SharedProbe(Arc<dyn Probe>);

impl SharedProbe {
    pub fn new(probe: impl Probe + 'static) -> Self {
        Self(Arc::new(probe))
    }
}

impl ProbeFactory for SharedProbe {
    fn create(&self, _services: &Services) -> Result<Arc<dyn Probe>, ProbeError> {
        Ok(self.0.clone())
    }
}
