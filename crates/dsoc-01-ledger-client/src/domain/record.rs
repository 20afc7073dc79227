//! On-ledger ticket layout.
//!
//! The contract stores the status as a raw `u8`. Decoding happens here, at
//! the client boundary, so no raw code ever reaches the engine or the index.

use crate::error::{LedgerError, LedgerResult};
use shared_types::{Address, Amount, Digest, LedgerTicket, TicketId, TicketStatus, TokenId};

/// Ticket as stored by the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTicketRecord {
    pub ticket_id: TicketId,
    pub client: Address,
    pub analyst: Option<Address>,
    pub evidence_hash: Digest,
    pub report_hash: Option<Digest>,
    /// Raw status code; see `TicketStatus::code`.
    pub status_code: u8,
    pub stake_amount: Amount,
    pub stake_token: TokenId,
    pub validated_by: Option<Address>,
    pub version: u64,
}

impl RawTicketRecord {
    pub fn encode(ticket: &LedgerTicket) -> Self {
        Self {
            ticket_id: ticket.ticket_id,
            client: ticket.client,
            analyst: ticket.analyst,
            evidence_hash: ticket.evidence_hash,
            report_hash: ticket.report_hash,
            status_code: ticket.status.code(),
            stake_amount: ticket.stake_amount,
            stake_token: ticket.stake_token,
            validated_by: ticket.validated_by,
            version: ticket.version,
        }
    }

    /// Decode into a typed ticket, rejecting unknown codes and records that
    /// break the field/status invariants.
    pub fn decode(&self) -> LedgerResult<LedgerTicket> {
        let status = TicketStatus::try_from(self.status_code)?;
        let ticket = LedgerTicket {
            ticket_id: self.ticket_id,
            client: self.client,
            analyst: self.analyst,
            evidence_hash: self.evidence_hash,
            report_hash: self.report_hash,
            status,
            stake_amount: self.stake_amount,
            stake_token: self.stake_token,
            validated_by: self.validated_by,
            version: self.version,
        };

        if !ticket.is_well_formed() {
            return Err(LedgerError::MalformedRecord {
                reason: format!(
                    "ticket {} fields inconsistent with status {}",
                    self.ticket_id, status
                ),
            });
        }
        Ok(ticket)
    }
}
