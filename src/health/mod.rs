//! Health gating for the supervised child.
//!
//! The gate polls an [`HttpProbe`] against the child's health endpoint,
//! sleeping along the capped linear series of a [`RetryPolicy`] between
//! failures, and checks child liveness before every sleep so a crash during
//! startup is reported immediately instead of after the full budget.

mod backoff;
pub mod gate;
mod probe;

pub use backoff::{Delays, RetryPolicy};
pub use gate::{wait_until_healthy, GateReport, GateVerdict};
pub use probe::{HealthCheckResult, HealthProbe, HttpProbe, ProbeOutcome};
