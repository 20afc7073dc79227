//! Index store port
//!
//! Read-optimized projection of ledger state. Reads are served to callers
//! directly; writes come only from the lifecycle engine's projection step and
//! from reconciliation, and are conditional on the ledger version.

use crate::domain::{PendingKey, PendingReconciliation, Projection, WriteOutcome};
use crate::error::IndexResult;
use async_trait::async_trait;
use shared_types::{
    Address, Balances, RewardToken, Role, StakeToken, TicketId, TicketSnapshot, TicketStatus,
    UserRecord,
};

/// Queryable projection of ticket, user and token state.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Store a full snapshot unless a newer version is already stored.
    async fn upsert_ticket(&self, snapshot: TicketSnapshot) -> IndexResult<WriteOutcome>;

    async fn get_ticket(&self, ticket_id: TicketId) -> IndexResult<Option<TicketSnapshot>>;

    /// Tickets where `address` acts as `role`, newest first.
    async fn query_tickets_by_role(
        &self,
        address: Address,
        role: Role,
    ) -> IndexResult<Vec<TicketSnapshot>>;

    /// Tickets currently in `status`, newest first.
    async fn tickets_by_status(&self, status: TicketStatus) -> IndexResult<Vec<TicketSnapshot>>;

    /// Every ticket, newest first.
    async fn list_tickets(&self) -> IndexResult<Vec<TicketSnapshot>>;

    /// Mirror a committed transition: ticket, stake tokens and minted rewards.
    ///
    /// Each record is written under the version rule of
    /// [`version_admits`](crate::domain::version_admits). The outcome reflects
    /// the ticket record when the projection carries one.
    async fn apply_projection(&self, projection: Projection) -> IndexResult<WriteOutcome>;

    async fn stake_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<StakeToken>>;

    async fn reward_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<RewardToken>>;

    /// Register `address` on first contact. An existing record is returned
    /// unchanged, whatever `role` is passed.
    async fn register_user(&self, address: Address, role: Role) -> IndexResult<UserRecord>;

    async fn get_user(&self, address: Address) -> IndexResult<Option<UserRecord>>;

    /// Balances recomputed from the owner's token history.
    async fn balances(&self, address: Address) -> IndexResult<Balances>;

    /// Record (or update) a divergence to be repaired by reconciliation.
    async fn record_reconciliation_pending(&self, entry: PendingReconciliation) -> IndexResult<()>;

    async fn clear_reconciliation_pending(&self, key: PendingKey) -> IndexResult<()>;

    /// Clear the entry for `expected.key` only while it still records the
    /// same divergence as `expected`. Returns whether an entry was removed.
    async fn clear_reconciliation_pending_if(
        &self,
        expected: &PendingReconciliation,
    ) -> IndexResult<bool>;

    async fn pending_reconciliations(&self) -> IndexResult<Vec<PendingReconciliation>>;
}
