//! Error types for the Ledger Client

use shared_types::{Address, Amount, DecodeError, TicketId, TicketStatus, TokenId, ValidatorPolicy};
use thiserror::Error;

/// Why the ledger refused a transition.
///
/// Rejections are authoritative: nothing was committed and the same call
/// would be refused again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Stake token already consumed by another ticket
    #[error("stake token {token_id} already used")]
    DoubleSpend { token_id: TokenId },

    #[error("stake token {token_id} not found")]
    StakeNotFound { token_id: TokenId },

    #[error("stake token {token_id} is not owned by the sender")]
    NotStakeOwner { token_id: TokenId },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("content digest must not be empty")]
    EmptyDigest,

    #[error("ticket {ticket_id} not found")]
    TicketNotFound { ticket_id: TicketId },

    #[error("ticket {ticket_id} is {status}, expected {expected}")]
    WrongStatus {
        ticket_id: TicketId,
        status: TicketStatus,
        expected: TicketStatus,
    },

    /// Lost the claim race
    #[error("ticket {ticket_id} already claimed by {analyst}")]
    AlreadyClaimed { ticket_id: TicketId, analyst: Address },

    /// Client claiming its own ticket, or analyst validating its own report
    #[error("sender may not act on its own ticket {ticket_id}")]
    SelfDealing { ticket_id: TicketId },

    #[error("sender is not the analyst assigned to ticket {ticket_id}")]
    NotAssignedAnalyst { ticket_id: TicketId },

    #[error("sender may not validate ticket {ticket_id} under {policy:?} policy")]
    NotValidator {
        ticket_id: TicketId,
        policy: ValidatorPolicy,
    },

    #[error("reward plan for ticket {ticket_id} totals {actual}, stake is {expected}")]
    DistributionMismatch {
        ticket_id: TicketId,
        expected: Amount,
        actual: Amount,
    },
}

/// Ledger Client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger refused the transition
    #[error("Ledger rejected transition: {0}")]
    Rejected(RejectReason),

    /// The ledger could not be reached
    #[error("Ledger unreachable: {reason}")]
    Unreachable { reason: String },

    /// No acknowledgement within the deadline; the submission may still land
    #[error("Ledger timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// A stored record failed to decode at the client boundary
    #[error("Malformed ledger record: {reason}")]
    MalformedRecord { reason: String },
}

impl LedgerError {
    /// Unreachable and timeout errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Unreachable { .. } | LedgerError::Timeout { .. }
        )
    }
}

impl From<RejectReason> for LedgerError {
    fn from(reason: RejectReason) -> Self {
        LedgerError::Rejected(reason)
    }
}

impl From<DecodeError> for LedgerError {
    fn from(err: DecodeError) -> Self {
        LedgerError::MalformedRecord {
            reason: err.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
