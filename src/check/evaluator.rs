//! Concurrent evaluation of registered checks
//!
//! One evaluation:
//! 1. Selects registrations with a `Selector`
//! 2. Spawns one task per check; each resolves its probe, runs it under the
//!    effective timeout and converts every failure into an outcome
//! 3. Collects all outcomes and folds them worst-wins into an `AggregateReport`
//!
//! Two cancellation scopes apply. A per-check timeout fails only that check.
//! The caller's token (or overall deadline) aborts the whole evaluation, which
//! then returns `EvaluationError::Cancelled` instead of a partial report.

use crate::check::clock::{Clock, SystemClock};
use crate::check::{
    AggregateReport, CheckContext, CheckOutcome, ProbeError, ProbeFactory, Registry, Selector,
    Services, Status,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("evaluation cancelled before all checks completed")]
    Cancelled,
}

/// Caller-side controls for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Overall deadline measured from the start of the evaluation
    pub deadline: Option<Duration>,
    /// Cancelling this token aborts the evaluation
    pub cancel: CancellationToken,
}

impl EvaluationOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs checks from a shared registry
///
/// Cheap to share behind an `Arc`; any number of evaluations may run at once.
pub struct Evaluator {
    registry: Arc<Registry>,
    services: Arc<Services>,
    clock: Arc<dyn Clock>,
    default_timeout: Option<Duration>,
}

impl Evaluator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            services: Arc::new(Services::new()),
            clock: Arc::new(SystemClock),
            default_timeout: None,
        }
    }

    pub fn with_services(mut self, services: Arc<Services>) -> Self {
        self.services = services;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Timeout for registrations that do not declare their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate every check the selector accepts
    ///
    /// # Returns
    /// * `Ok(AggregateReport)` - one entry per selected check
    /// * `Err(EvaluationError::Cancelled)` - the caller's token or deadline fired first
    pub async fn evaluate(
        &self,
        selector: &Selector,
        options: EvaluationOptions,
    ) -> Result<AggregateReport, EvaluationError> {
        let started = Instant::now();
        let checked_at = self.clock.now();
        let deadline = options.deadline.map(|d| started + d);

        if options.cancel.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }

        // Child of the caller's token so both caller cancellation and our own
        // deadline reach every running probe.
        let evaluation_token = options.cancel.child_token();

        let mut tasks = JoinSet::new();
        let mut selected = Vec::new();

        for registration in self.registry.by_predicate(selector) {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let run = CheckRun {
                name: registration.name().to_string(),
                factory: registration.factory().clone(),
                failure_status: registration.failure_status(),
                tags: registration.tags().clone(),
                timeout: min_timeout(registration.timeout().or(self.default_timeout), remaining),
                services: self.services.clone(),
                cancel: evaluation_token.child_token(),
            };
            selected.push((run.name.clone(), run.failure_status, run.tags.clone()));
            tasks.spawn(run.execute());
        }

        debug!(checks = selected.len(), "Evaluating health checks");

        let collected = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => None,
            _ = sleep_until(deadline) => None,
            entries = collect(&mut tasks) => Some(entries),
        };

        let Some(mut entries) = collected else {
            evaluation_token.cancel();
            tasks.abort_all();
            warn!(
                checks = selected.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Health check evaluation cancelled"
            );
            return Err(EvaluationError::Cancelled);
        };

        // A task that died without reporting still gets an entry
        for (name, failure_status, tags) in selected {
            entries.entry(name).or_insert_with(|| {
                let mut outcome = failure_outcome(
                    failure_status,
                    &ProbeError::failed("health check task did not complete"),
                );
                outcome.duration = started.elapsed();
                outcome.tags = tags;
                outcome
            });
        }

        let report = AggregateReport::new(entries, started.elapsed(), checked_at);
        debug!(
            checks = report.entries.len(),
            status = %report.overall_status,
            elapsed_ms = report.total_duration.as_millis() as u64,
            "Health check evaluation completed"
        );
        Ok(report)
    }
}

/// Everything one spawned check task owns
struct CheckRun {
    name: String,
    factory: Arc<dyn ProbeFactory>,
    failure_status: Status,
    tags: BTreeSet<String>,
    timeout: Option<Duration>,
    services: Arc<Services>,
    cancel: CancellationToken,
}

impl CheckRun {
    async fn execute(self) -> (String, CheckOutcome) {
        let started = Instant::now();
        let result = self.invoke().await;

        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(check = %self.name, error = %e, "Health check failed");
                failure_outcome(self.failure_status, &e)
            }
        };
        outcome.duration = started.elapsed();
        outcome.tags = self.tags;
        (self.name, outcome)
    }

    /// Resolve and run the probe, folding timeouts and panics into `ProbeError`
    async fn invoke(&self) -> Result<CheckOutcome, ProbeError> {
        let probe = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.factory.create(&self.services)
        }))
        .map_err(|payload| ProbeError::Panicked(panic_message(payload.as_ref())))??;
        let ctx = CheckContext::new(self.name.clone(), self.failure_status, self.cancel.clone());

        let guarded = AssertUnwindSafe(probe.check(&ctx)).catch_unwind();
        let finished = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
                Ok(finished) => finished,
                Err(_) => {
                    self.cancel.cancel();
                    return Err(ProbeError::Timeout(timeout));
                }
            },
            None => guarded.await,
        };

        match finished {
            Ok(result) => result,
            Err(payload) => Err(ProbeError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

async fn collect(tasks: &mut JoinSet<(String, CheckOutcome)>) -> BTreeMap<String, CheckOutcome> {
    let mut entries = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, outcome)) => {
                entries.insert(name, outcome);
            }
            Err(e) => warn!(error = %e, "Health check task failed to join"),
        }
    }
    entries
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn min_timeout(check: Option<Duration>, remaining: Option<Duration>) -> Option<Duration> {
    match (check, remaining) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Outcome recorded when a probe could not produce one itself
fn failure_outcome(failure_status: Status, error: &ProbeError) -> CheckOutcome {
    let description = match error {
        ProbeError::Timeout(timeout) => format!("Timed out after {}ms", timeout.as_millis()),
        other => other.to_string(),
    };
    CheckOutcome::new(failure_status)
        .with_description(description)
        .with_error(error.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod tests;
