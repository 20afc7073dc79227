//! Domain logic for Reconciliation

pub mod circuit_breaker;
pub mod report;

pub use circuit_breaker::{CircuitBreaker, SweepEvent, SweepState};
pub use report::SweepReport;
