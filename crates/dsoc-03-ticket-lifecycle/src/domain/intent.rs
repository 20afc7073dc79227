//! Caller intents
//!
//! An intent names the actor and the transition it asks for. Shape checks
//! happen here; status checks belong to the state machine.

use crate::error::{LifecycleError, LifecycleResult};
use shared_types::{
    Address, Amount, Digest, Role, TicketId, TicketMetadata, TicketStatus, TokenId,
    ValidatorPolicy,
};

/// Longest accepted ticket title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Deposit a stake usable by one later ticket.
    Stake { owner: Address, amount: Amount },
    /// Open a ticket backed by an unused stake token.
    CreateTicket {
        client: Address,
        stake_token: TokenId,
        evidence_hash: Digest,
        metadata: TicketMetadata,
    },
    Claim {
        analyst: Address,
        ticket_id: TicketId,
    },
    SubmitReport {
        analyst: Address,
        ticket_id: TicketId,
        report_hash: Digest,
    },
    Validate {
        validator: Address,
        ticket_id: TicketId,
        approved: bool,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Stake { .. } => "stake",
            Intent::CreateTicket { .. } => "create",
            Intent::Claim { .. } => "claim",
            Intent::SubmitReport { .. } => "submit",
            Intent::Validate { .. } => "validate",
        }
    }

    /// Address submitting the ledger transaction.
    pub fn sender(&self) -> Address {
        match self {
            Intent::Stake { owner, .. } => *owner,
            Intent::CreateTicket { client, .. } => *client,
            Intent::Claim { analyst, .. } | Intent::SubmitReport { analyst, .. } => *analyst,
            Intent::Validate { validator, .. } => *validator,
        }
    }

    /// Ticket the intent acts on; `None` until the ledger assigns one.
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            Intent::Stake { .. } | Intent::CreateTicket { .. } => None,
            Intent::Claim { ticket_id, .. }
            | Intent::SubmitReport { ticket_id, .. }
            | Intent::Validate { ticket_id, .. } => Some(*ticket_id),
        }
    }

    /// Role the sender is registered with on first contact.
    pub fn actor_role(&self, policy: ValidatorPolicy) -> Role {
        match self {
            Intent::Stake { .. } | Intent::CreateTicket { .. } => Role::Client,
            Intent::Claim { .. } | Intent::SubmitReport { .. } => Role::Analyst,
            Intent::Validate { .. } => policy.required_role(),
        }
    }

    /// Status the ticket must be in for the intent to apply.
    pub fn required_status(&self) -> Option<TicketStatus> {
        match self {
            Intent::Stake { .. } | Intent::CreateTicket { .. } => None,
            Intent::Claim { .. } => Some(TicketStatus::Open),
            Intent::SubmitReport { .. } => Some(TicketStatus::Claimed),
            Intent::Validate { .. } => Some(TicketStatus::Submitted),
        }
    }

    /// Status the ticket ends up in when the intent commits.
    pub fn target_status(&self) -> Option<TicketStatus> {
        match self {
            Intent::Stake { .. } => None,
            Intent::CreateTicket { .. } => Some(TicketStatus::Open),
            Intent::Claim { .. } => Some(TicketStatus::Claimed),
            Intent::SubmitReport { .. } => Some(TicketStatus::Submitted),
            Intent::Validate { approved: true, .. } => Some(TicketStatus::Approved),
            Intent::Validate { approved: false, .. } => Some(TicketStatus::Rejected),
        }
    }

    /// Reject intents that are malformed whatever the ticket state.
    pub fn check_shape(&self) -> LifecycleResult<()> {
        match self {
            Intent::Stake { amount: 0, .. } => malformed("stake amount must be positive"),
            Intent::CreateTicket {
                evidence_hash,
                metadata,
                ..
            } => {
                if evidence_hash.is_zero() {
                    return malformed("evidence hash must not be empty");
                }
                let title = metadata.title.trim();
                if title.is_empty() {
                    return malformed("ticket title must not be empty");
                }
                if title.chars().count() > MAX_TITLE_LEN {
                    return malformed("ticket title too long");
                }
                Ok(())
            }
            Intent::SubmitReport { report_hash, .. } if report_hash.is_zero() => {
                malformed("report hash must not be empty")
            }
            _ => Ok(()),
        }
    }
}

fn malformed(reason: &str) -> LifecycleResult<()> {
    Err(LifecycleError::MalformedIntent {
        reason: reason.to_string(),
    })
}
