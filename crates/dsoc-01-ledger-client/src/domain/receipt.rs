//! Submission context and committed-transition receipts.

use serde::{Deserialize, Serialize};
use shared_types::{
    Address, Amount, Digest, LedgerTicket, RewardToken, StakeToken, SubmissionId, TicketId,
    TokenId, TxId,
};

/// Sender and idempotency key of one ledger submission.
///
/// Retrying with the same `submission_id` never applies a transition twice:
/// the ledger answers a replay with the receipt it already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub sender: Address,
    pub submission_id: SubmissionId,
}

impl TxContext {
    /// Context with a fresh submission id.
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            submission_id: SubmissionId::new(),
        }
    }
}

/// Transition kind recorded with each receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    CreateStake,
    CreateTicket,
    Claim,
    SubmitReport,
    Validate,
}

/// Events emitted by the ticket contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    StakeCreated {
        token_id: TokenId,
        owner: Address,
        amount: Amount,
    },
    TicketCreated {
        ticket_id: TicketId,
        client: Address,
        stake: Amount,
    },
    TicketAssigned {
        ticket_id: TicketId,
        analyst: Address,
    },
    ReportSubmitted {
        ticket_id: TicketId,
        analyst: Address,
        report_hash: Digest,
    },
    TicketValidated {
        ticket_id: TicketId,
        approved: bool,
    },
    RewardMinted {
        token_id: TokenId,
        owner: Address,
        amount: Amount,
    },
    StakeRefunded {
        token_id: TokenId,
        owner: Address,
        amount: Amount,
    },
}

/// A committed ledger transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: TxId,
    pub submission_id: SubmissionId,
    /// Global ledger sequence number of this transition.
    pub sequence: u64,
    pub kind: TxKind,
    pub sender: Address,
    /// Ticket state after the transition (absent for stake creation).
    pub ticket: Option<LedgerTicket>,
    /// Stake token created or modified by the transition.
    pub stake_token: Option<StakeToken>,
    /// Reward tokens minted by the transition.
    pub rewards: Vec<RewardToken>,
    pub events: Vec<LedgerEvent>,
}

impl TxReceipt {
    pub fn ticket_id(&self) -> Option<TicketId> {
        self.ticket.as_ref().map(|t| t.ticket_id)
    }

    /// Sum of minted rewards.
    pub fn minted(&self) -> Amount {
        self.rewards
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.amount))
    }

    /// Stake returned to its owner by this transition.
    pub fn refunded(&self) -> Amount {
        self.events
            .iter()
            .map(|e| match e {
                LedgerEvent::StakeRefunded { amount, .. } => *amount,
                _ => 0,
            })
            .sum()
    }
}

/// Tokens tied to one ticket, as read back for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketTokens {
    pub stake: Option<StakeToken>,
    pub rewards: Vec<RewardToken>,
}
