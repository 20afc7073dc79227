//! Error types for the Ticket Lifecycle Engine

use dsoc_01_ledger_client::{LedgerError, RejectReason};
use dsoc_02_index_store::IndexError;
use shared_types::{SubmissionId, TicketId, TicketStatus};
use thiserror::Error;

/// Whether a failed ledger submission may still have committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// The ledger confirmed the submission did not land.
    NotCommitted,
    /// The submission may land later; reconciliation will find out.
    Unknown,
}

/// Lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The intent does not apply to the ticket's current (or assumed) status
    #[error("Invalid transition: {intent} on ticket {ticket_id} in {from}: {reason}")]
    InvalidTransition {
        ticket_id: TicketId,
        from: TicketStatus,
        intent: &'static str,
        reason: String,
    },

    /// The intent is malformed regardless of ticket state
    #[error("Malformed intent: {reason}")]
    MalformedIntent { reason: String },

    /// The ledger refused the transition; authoritative, never retried
    #[error("Ledger rejected transition: {reason}")]
    LedgerRejected { reason: RejectReason },

    #[error("Ledger unreachable ({commit_state:?}, submission {submission_id}): {reason}")]
    LedgerUnreachable {
        submission_id: SubmissionId,
        commit_state: CommitState,
        reason: String,
    },

    #[error("Ledger timed out after {waited_ms}ms ({commit_state:?}, submission {submission_id})")]
    LedgerTimeout {
        submission_id: SubmissionId,
        commit_state: CommitState,
        waited_ms: u64,
    },

    /// A ledger read failed; nothing was submitted
    #[error("Ledger read failed: {reason}")]
    LedgerReadFailed { reason: String },

    /// A ledger record failed to decode
    #[error("Malformed ledger record: {reason}")]
    MalformedLedgerRecord { reason: String },

    /// The ledger has no such ticket
    #[error("Ticket {ticket_id} not found")]
    TicketNotFound { ticket_id: TicketId },

    /// A read could not be served by the index
    #[error("Index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    /// A projection write failed after every retry
    #[error("Index write failed: {reason}")]
    IndexWriteFailed { reason: String },

    /// Engine configuration is inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl LifecycleError {
    pub fn is_double_spend(&self) -> bool {
        matches!(
            self,
            LifecycleError::LedgerRejected {
                reason: RejectReason::DoubleSpend { .. }
            }
        )
    }

    /// Commit state of a transient ledger failure; `None` for every other error.
    pub fn commit_state(&self) -> Option<CommitState> {
        match self {
            LifecycleError::LedgerUnreachable { commit_state, .. }
            | LifecycleError::LedgerTimeout { commit_state, .. } => Some(*commit_state),
            _ => None,
        }
    }

    /// Build the error for a ledger failure on `submission_id`.
    pub(crate) fn from_ledger(
        err: LedgerError,
        submission_id: SubmissionId,
        commit_state: CommitState,
    ) -> Self {
        match err {
            LedgerError::Rejected(reason) => LifecycleError::LedgerRejected { reason },
            LedgerError::Unreachable { reason } => LifecycleError::LedgerUnreachable {
                submission_id,
                commit_state,
                reason,
            },
            LedgerError::Timeout { waited_ms } => LifecycleError::LedgerTimeout {
                submission_id,
                commit_state,
                waited_ms,
            },
            LedgerError::MalformedRecord { reason } => {
                LifecycleError::MalformedLedgerRecord { reason }
            }
        }
    }
}

impl From<LedgerError> for LifecycleError {
    /// Mapping for ledger reads, which carry no submission.
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(reason) => LifecycleError::LedgerRejected { reason },
            LedgerError::MalformedRecord { reason } => {
                LifecycleError::MalformedLedgerRecord { reason }
            }
            other => LifecycleError::LedgerReadFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<IndexError> for LifecycleError {
    fn from(err: IndexError) -> Self {
        LifecycleError::IndexUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;
