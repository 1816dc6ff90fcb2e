//! Dependency-resolution context handed to probe factories
//!
//! A small type-keyed map. Startup code inserts shared clients (HTTP clients,
//! connection pools, ...) and factories look them up by type when they build
//! a probe for an evaluation.

use crate::check::ProbeError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Services {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any previous value of the same type
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Like `get`, but a missing service is a `ProbeError::MissingDependency`
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ProbeError> {
        self.get::<T>()
            .ok_or(ProbeError::MissingDependency(std::any::type_name::<T>()))
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("len", &self.entries.len())
            .finish()
    }
}
