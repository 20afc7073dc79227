//! Ticket state machine
//!
//! ```text
//! [OPEN] ──claim──→ [CLAIMED] ──submit──→ [SUBMITTED] ──validate(true)──→ [APPROVED]
//!                                              │
//!                                              └────validate(false)──→ [REJECTED]
//! ```
//!
//! The check runs against the index snapshot, which may lag the ledger. A
//! pass is advisory: the ledger re-checks every rule atomically and its
//! answer wins. A failure against a known snapshot is final for the caller.

use crate::domain::intent::Intent;
use crate::error::{LifecycleError, LifecycleResult};
use shared_types::{TicketSnapshot, ValidatorPolicy};

/// Check `intent` against the last known state of its ticket.
///
/// With no snapshot the intent passes; the ledger decides.
pub fn precheck(
    intent: &Intent,
    snapshot: Option<&TicketSnapshot>,
    policy: ValidatorPolicy,
) -> LifecycleResult<()> {
    let (Some(snapshot), Some(required), Some(target)) =
        (snapshot, intent.required_status(), intent.target_status())
    else {
        return Ok(());
    };
    let ticket = &snapshot.ticket;
    let invalid = |reason: &str| {
        Err(LifecycleError::InvalidTransition {
            ticket_id: ticket.ticket_id,
            from: ticket.status,
            intent: intent.name(),
            reason: reason.to_string(),
        })
    };

    if ticket.status != required || !ticket.status.can_transition_to(target) {
        return invalid(&format!("requires {required}"));
    }

    let sender = intent.sender();
    match intent {
        Intent::Claim { .. } if ticket.client == sender => {
            invalid("client cannot claim its own ticket")
        }
        Intent::SubmitReport { .. } if ticket.analyst != Some(sender) => {
            invalid("only the assigned analyst can submit")
        }
        Intent::Validate { .. } if ticket.analyst == Some(sender) => {
            invalid("analyst cannot validate its own report")
        }
        Intent::Validate { .. }
            if policy == ValidatorPolicy::Client && ticket.client != sender =>
        {
            invalid("only the ticket's client can validate")
        }
        _ => Ok(()),
    }
}
