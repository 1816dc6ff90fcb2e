//! Adapter turning an async closure into a probe

use crate::check::{CheckContext, CheckOutcome, Probe, ProbeError};
use async_trait::async_trait;
use std::future::Future;

/// Probe backed by a closure
///
/// # Example
/// ```ignore
/// let probe = probe_fn(|_ctx| async { Ok(CheckOutcome::healthy()) });
/// registry.register(CheckRegistration::from_probe("self", probe))?;
/// ```
pub struct FnProbe<F> {
    f: F,
}

pub fn probe_fn<F, Fut>(f: F) -> FnProbe<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckOutcome, ProbeError>> + Send,
{
    FnProbe { f }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckOutcome, ProbeError>> + Send,
{
    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, ProbeError> {
        (self.f)(ctx.clone()).await
    }
}
