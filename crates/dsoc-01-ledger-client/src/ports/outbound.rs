//! Ledger gateway port
//!
//! The lifecycle engine drives the authoritative ledger through this trait.
//! Every write either commits one immutable, uniquely identified transition
//! or fails without effect.

use crate::domain::{RewardPlan, TicketTokens, TxContext, TxReceipt};
use crate::error::{LedgerError, LedgerResult};
use async_trait::async_trait;
use shared_types::{Amount, Digest, LedgerTicket, SubmissionId, TicketId, TokenId};

/// Outcome of a ledger write.
pub type TxResult = Result<TxReceipt, LedgerError>;

/// Gateway to the authoritative ticket ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Deposit `amount` as a new stake token owned by the sender.
    async fn create_stake(&self, ctx: TxContext, amount: Amount) -> TxResult;

    /// Open a ticket backed by `stake_token`, consuming it.
    ///
    /// Fails with `DoubleSpend` if the token was already consumed.
    async fn create_ticket(
        &self,
        ctx: TxContext,
        evidence_hash: Digest,
        stake_token: TokenId,
    ) -> TxResult;

    /// Assign the sender as analyst of an `Open` ticket.
    ///
    /// Concurrent claims are serialized; exactly one wins.
    async fn claim(&self, ctx: TxContext, ticket_id: TicketId) -> TxResult;

    /// Attach the report of the assigned analyst.
    async fn submit_report(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        report_hash: Digest,
    ) -> TxResult;

    /// Approve or reject a submitted ticket.
    ///
    /// On approval the plan is minted and must total the stake. On rejection
    /// the plan must be empty and the stake is refunded to the client.
    async fn validate(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        approved: bool,
        plan: RewardPlan,
    ) -> TxResult;

    /// Current committed state of a ticket.
    async fn get_ticket(&self, ticket_id: TicketId) -> LedgerResult<Option<LedgerTicket>>;

    /// Stake and reward tokens tied to a ticket.
    async fn ticket_tokens(&self, ticket_id: TicketId) -> LedgerResult<TicketTokens>;

    /// Receipt of a committed submission, or `None` if it never committed.
    async fn lookup_submission(
        &self,
        submission_id: SubmissionId,
    ) -> LedgerResult<Option<TxReceipt>>;
}
