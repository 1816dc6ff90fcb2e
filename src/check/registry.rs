//! Registry of named checks
//!
//! Built once during startup, then shared read-only (behind an `Arc`) by
//! every evaluation. There is no global instance: whoever builds the
//! registry passes it to the evaluator explicitly.

use crate::check::{Probe, ProbeFactory, Selector, SharedProbe, Status};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a health check named '{0}' is already registered")]
    DuplicateName(String),

    #[error("health check name cannot be empty")]
    EmptyName,
}

/// Named binding of a probe factory plus its policy
#[derive(Clone)]
pub struct CheckRegistration {
    name: String,
    factory: Arc<dyn ProbeFactory>,
    failure_status: Status,
    tags: BTreeSet<String>,
    timeout: Option<Duration>,
}

impl CheckRegistration {
    /// New registration with failure status `Unhealthy`, no tags and no timeout
    pub fn new(name: impl Into<String>, factory: impl ProbeFactory + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            failure_status: Status::Unhealthy,
            tags: BTreeSet::new(),
            timeout: None,
        }
    }

    /// Registration backed by a single shared probe instance
    pub fn from_probe(name: impl Into<String>, probe: impl Probe + 'static) -> Self {
        Self::new(name, SharedProbe::new(probe))
    }

    pub fn with_failure_status(mut self, status: Status) -> Self {
        self.failure_status = status;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &Arc<dyn ProbeFactory> {
        &self.factory
    }

    pub fn failure_status(&self) -> Status {
        self.failure_status
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for CheckRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistration")
            .field("name", &self.name)
            .field("failure_status", &self.failure_status)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Ordered set of registrations with unique names
#[derive(Debug, Default)]
pub struct Registry {
    registrations: Vec<CheckRegistration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration
    ///
    /// A second registration with an existing name is rejected, never
    /// silently merged or overwritten.
    pub fn register(&mut self, registration: CheckRegistration) -> Result<(), RegistryError> {
        if registration.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.get(&registration.name).is_some() {
            return Err(RegistryError::DuplicateName(registration.name));
        }
        self.registrations.push(registration);
        Ok(())
    }

    /// All registrations in registration order
    pub fn all(&self) -> std::slice::Iter<'_, CheckRegistration> {
        self.registrations.iter()
    }

    /// Registrations the selector accepts, in registration order
    pub fn by_predicate<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = &'a CheckRegistration> + 'a {
        self.registrations
            .iter()
            .filter(move |r| selector.matches(&r.name, &r.tags))
    }

    pub fn get(&self, name: &str) -> Option<&CheckRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
