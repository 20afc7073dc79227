//! Driving Ports (API - Inbound)

use crate::domain::Intent;
use crate::error::LifecycleResult;
use async_trait::async_trait;
use dsoc_02_index_store::{PendingKey, PendingReconciliation};
use shared_types::{
    Address, RewardToken, Role, StakeToken, SubmissionId, TicketId, TicketSnapshot, TxId,
    UserRecord,
};

/// Whether the index reflects a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The projection was written.
    Fresh,
    /// The ledger committed but the index could not be updated; `pending`
    /// is queued for reconciliation.
    Stale { pending: PendingKey },
}

/// Outcome of a committed intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub tx_id: TxId,
    pub submission_id: SubmissionId,
    /// Resulting ticket state; `None` only for stake deposits.
    pub snapshot: Option<TicketSnapshot>,
    /// Stake token created or settled by the transition.
    pub stake_token: Option<StakeToken>,
    /// Reward tokens minted by an approval.
    pub minted: Vec<RewardToken>,
    pub freshness: Freshness,
}

impl Applied {
    pub fn ticket_id(&self) -> Option<TicketId> {
        self.snapshot.as_ref().map(TicketSnapshot::ticket_id)
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

/// What the ledger knows about a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// The submission landed and has been projected.
    Committed {
        tx_id: TxId,
        ticket_id: Option<TicketId>,
    },
    /// The ledger has no record of it (yet).
    Unknown,
}

/// Result of working one pending-reconciliation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOutcome {
    /// The index now matches the ledger; the entry is cleared.
    Repaired,
    /// Nothing to project yet; the entry stays with its attempt count.
    StillPending { attempts: u32 },
}

/// Ticket Lifecycle API
///
/// Writes go ledger first, then index. Reads come from the index and may lag.
#[async_trait]
pub trait TicketLifecycleApi: Send + Sync {
    /// Validate and commit an intent, then project it into the index.
    ///
    /// A failed projection does not fail the call: the result carries
    /// `Freshness::Stale` and the divergence is queued.
    async fn apply(&self, intent: Intent) -> LifecycleResult<Applied>;

    /// Overwrite the index entry of `ticket_id` from ledger state.
    async fn reconcile(&self, ticket_id: TicketId) -> LifecycleResult<TicketSnapshot>;

    /// Resolve a submission whose outcome was never confirmed.
    async fn reconcile_submission(
        &self,
        submission_id: SubmissionId,
    ) -> LifecycleResult<SubmissionStatus>;

    /// Work one pending entry. Failed or unresolved entries have their
    /// attempt count raised.
    async fn reconcile_pending(&self, entry: PendingReconciliation)
        -> LifecycleResult<PendingOutcome>;

    /// Drop a pending entry without repairing it.
    async fn discard_pending(&self, key: PendingKey) -> LifecycleResult<()>;

    /// Index read; may lag the ledger.
    async fn get_snapshot(&self, ticket_id: TicketId) -> LifecycleResult<Option<TicketSnapshot>>;

    /// Register `address` with `role` unless it is already known.
    async fn register_user(&self, address: Address, role: Role) -> LifecycleResult<UserRecord>;

    /// Every queued divergence.
    async fn pending_reconciliations(&self) -> LifecycleResult<Vec<PendingReconciliation>>;
}
