//! Core health model: registration, evaluation and aggregation

pub mod clock;
pub mod evaluator;
pub mod outcome;
pub mod probe;
pub mod registry;
pub mod selector;
pub mod services;
pub mod status;

pub use evaluator::{EvaluationError, EvaluationOptions, Evaluator};
pub use outcome::{AggregateReport, CheckOutcome};
pub use probe::{CheckContext, Probe, ProbeError, ProbeFactory, SharedProbe};
pub use registry::{CheckRegistration, Registry, RegistryError};
pub use selector::Selector;
pub use services::Services;
pub use status::Status;
