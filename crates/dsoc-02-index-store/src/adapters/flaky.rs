//! Failure-injecting index wrapper
//!
//! Used to exercise the projection retry path and reconciliation: projection
//! writes can be failed a fixed number of times, or the whole store can be
//! marked unavailable. A pending entry can also be slipped in just before the
//! next projection lands, the way a concurrent writer would record one.

use crate::domain::{PendingKey, PendingReconciliation, Projection, WriteOutcome};
use crate::error::{IndexError, IndexResult};
use crate::ports::outbound::IndexStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    Address, Balances, RewardToken, Role, StakeToken, TicketId, TicketSnapshot, TicketStatus,
    UserRecord,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// `IndexStore` wrapper that fails on demand.
pub struct FlakyIndexStore<S> {
    inner: Arc<S>,
    projection_failures: AtomicU32,
    projection_attempts: AtomicU32,
    unavailable: AtomicBool,
    interleaved: Mutex<Option<PendingReconciliation>>,
}

impl<S: IndexStore> FlakyIndexStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            projection_failures: AtomicU32::new(0),
            projection_attempts: AtomicU32::new(0),
            unavailable: AtomicBool::new(false),
            interleaved: Mutex::new(None),
        }
    }

    /// Fail the next `count` ticket or projection writes.
    pub fn fail_next_projections(&self, count: u32) {
        self.projection_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every operation while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Record `entry` right before the next successful projection is applied.
    pub fn record_before_next_projection(&self, entry: PendingReconciliation) {
        *self.interleaved.lock() = Some(entry);
    }

    /// Projection writes seen so far, failed ones included.
    pub fn projection_attempts(&self) -> u32 {
        self.projection_attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    fn check_available(&self) -> IndexResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable {
                reason: "index offline".into(),
            });
        }
        Ok(())
    }

    fn check_projection(&self) -> IndexResult<()> {
        self.projection_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let consumed = self
            .projection_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(IndexError::Storage {
                reason: "write rejected".into(),
            }),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl<S: IndexStore + 'static> IndexStore for FlakyIndexStore<S> {
    async fn upsert_ticket(&self, snapshot: TicketSnapshot) -> IndexResult<WriteOutcome> {
        self.check_projection()?;
        self.inner.upsert_ticket(snapshot).await
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> IndexResult<Option<TicketSnapshot>> {
        self.check_available()?;
        self.inner.get_ticket(ticket_id).await
    }

    async fn query_tickets_by_role(
        &self,
        address: Address,
        role: Role,
    ) -> IndexResult<Vec<TicketSnapshot>> {
        self.check_available()?;
        self.inner.query_tickets_by_role(address, role).await
    }

    async fn tickets_by_status(&self, status: TicketStatus) -> IndexResult<Vec<TicketSnapshot>> {
        self.check_available()?;
        self.inner.tickets_by_status(status).await
    }

    async fn list_tickets(&self) -> IndexResult<Vec<TicketSnapshot>> {
        self.check_available()?;
        self.inner.list_tickets().await
    }

    async fn apply_projection(&self, projection: Projection) -> IndexResult<WriteOutcome> {
        self.check_projection()?;
        let interleaved = self.interleaved.lock().take();
        if let Some(entry) = interleaved {
            self.inner.record_reconciliation_pending(entry).await?;
        }
        self.inner.apply_projection(projection).await
    }

    async fn stake_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<StakeToken>> {
        self.check_available()?;
        self.inner.stake_tokens_by_owner(owner).await
    }

    async fn reward_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<RewardToken>> {
        self.check_available()?;
        self.inner.reward_tokens_by_owner(owner).await
    }

    async fn register_user(&self, address: Address, role: Role) -> IndexResult<UserRecord> {
        self.check_available()?;
        self.inner.register_user(address, role).await
    }

    async fn get_user(&self, address: Address) -> IndexResult<Option<UserRecord>> {
        self.check_available()?;
        self.inner.get_user(address).await
    }

    async fn balances(&self, address: Address) -> IndexResult<Balances> {
        self.check_available()?;
        self.inner.balances(address).await
    }

    async fn record_reconciliation_pending(
        &self,
        entry: PendingReconciliation,
    ) -> IndexResult<()> {
        self.check_available()?;
        self.inner.record_reconciliation_pending(entry).await
    }

    async fn clear_reconciliation_pending(&self, key: PendingKey) -> IndexResult<()> {
        self.check_available()?;
        self.inner.clear_reconciliation_pending(key).await
    }

    async fn clear_reconciliation_pending_if(
        &self,
        expected: &PendingReconciliation,
    ) -> IndexResult<bool> {
        self.check_available()?;
        self.inner.clear_reconciliation_pending_if(expected).await
    }

    async fn pending_reconciliations(&self) -> IndexResult<Vec<PendingReconciliation>> {
        self.check_available()?;
        self.inner.pending_reconciliations().await
    }
}
