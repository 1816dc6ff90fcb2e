//! checkup - aggregate health evaluation and reporting
//!
//! Register named probes in a `check::Registry`, evaluate them concurrently
//! with `check::Evaluator`, and hand the worst-wins `AggregateReport` to the
//! reporters in `report` (JSON, Prometheus, Pushgateway, webhooks).

pub mod check;
pub mod config;
pub mod probes;
pub mod publish;
pub mod report;
pub mod server;
