//! Driving Ports (API - Inbound)

use crate::domain::{SweepReport, SweepState};
use crate::error::SweepResult;
use async_trait::async_trait;

/// Reconciliation sweep API
#[async_trait]
pub trait SweepApi: Send + Sync {
    /// Work every pending entry once.
    async fn run_once(&self) -> SweepResult<SweepReport>;

    /// Circuit breaker state
    fn state(&self) -> SweepState;

    /// Manual intervention: resume sweeping after a halt.
    fn reset(&self) -> SweepState;
}
