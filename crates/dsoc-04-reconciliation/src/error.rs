//! Error types for Reconciliation

use thiserror::Error;

/// Sweep errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    /// Too many consecutive failed sweeps
    #[error("Sweeper halted awaiting intervention - circuit breaker triggered")]
    Halted,

    /// Pending entries could not be listed
    #[error("Pending entries unavailable: {reason}")]
    PendingUnavailable { reason: String },
}

/// Result type for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;
