//! Fault-injecting ledger wrapper
//!
//! Wraps any `LedgerClient` and injects the partial failures the lifecycle
//! engine must survive: a write that never left the client, a write that
//! committed but was never acknowledged, and a slow write.

use crate::domain::{RewardPlan, TicketTokens, TxContext, TxReceipt};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::outbound::{LedgerClient, TxResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Amount, Digest, LedgerTicket, SubmissionId, TicketId, TokenId};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A fault applied to the next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerFault {
    /// Fail before reaching the ledger. Nothing commits.
    Unreachable,
    /// Forward the write, then drop the acknowledgement.
    CommitThenTimeout,
    /// Sleep before forwarding the write.
    Delay(Duration),
}

/// `LedgerClient` wrapper with a queue of injected write faults.
pub struct FaultyLedger<L> {
    inner: Arc<L>,
    write_faults: Mutex<VecDeque<LedgerFault>>,
    read_failures: AtomicU32,
}

impl<L: LedgerClient> FaultyLedger<L> {
    pub fn new(inner: Arc<L>) -> Self {
        Self {
            inner,
            write_faults: Mutex::new(VecDeque::new()),
            read_failures: AtomicU32::new(0),
        }
    }

    /// Queue a fault for the next write that has none queued before it.
    pub fn inject(&self, fault: LedgerFault) {
        self.write_faults.lock().push_back(fault);
    }

    /// Make the next `count` reads fail as unreachable.
    pub fn fail_next_reads(&self, count: u32) {
        self.read_failures.store(count, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &Arc<L> {
        &self.inner
    }

    pub fn pending_faults(&self) -> usize {
        self.write_faults.lock().len()
    }

    async fn guarded_write<F>(&self, write: F) -> TxResult
    where
        F: Future<Output = TxResult> + Send,
    {
        let fault = self.write_faults.lock().pop_front();
        match fault {
            None => write.await,
            Some(LedgerFault::Unreachable) => {
                warn!("[dsoc-01] injected fault: ledger unreachable");
                Err(LedgerError::Unreachable {
                    reason: "connection refused".into(),
                })
            }
            Some(LedgerFault::CommitThenTimeout) => {
                let committed = write.await;
                warn!(
                    "[dsoc-01] injected fault: dropping acknowledgement (committed: {})",
                    committed.is_ok()
                );
                Err(LedgerError::Timeout { waited_ms: 0 })
            }
            Some(LedgerFault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                write.await
            }
        }
    }

    fn guarded_read(&self) -> LedgerResult<()> {
        let consumed = self
            .read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(LedgerError::Unreachable {
                reason: "read failed".into(),
            }),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl<L: LedgerClient + 'static> LedgerClient for FaultyLedger<L> {
    async fn create_stake(&self, ctx: TxContext, amount: Amount) -> TxResult {
        self.guarded_write(self.inner.create_stake(ctx, amount))
            .await
    }

    async fn create_ticket(
        &self,
        ctx: TxContext,
        evidence_hash: Digest,
        stake_token: TokenId,
    ) -> TxResult {
        self.guarded_write(self.inner.create_ticket(ctx, evidence_hash, stake_token))
            .await
    }

    async fn claim(&self, ctx: TxContext, ticket_id: TicketId) -> TxResult {
        self.guarded_write(self.inner.claim(ctx, ticket_id)).await
    }

    async fn submit_report(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        report_hash: Digest,
    ) -> TxResult {
        self.guarded_write(self.inner.submit_report(ctx, ticket_id, report_hash))
            .await
    }

    async fn validate(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        approved: bool,
        plan: RewardPlan,
    ) -> TxResult {
        self.guarded_write(self.inner.validate(ctx, ticket_id, approved, plan))
            .await
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> LedgerResult<Option<LedgerTicket>> {
        self.guarded_read()?;
        self.inner.get_ticket(ticket_id).await
    }

    async fn ticket_tokens(&self, ticket_id: TicketId) -> LedgerResult<TicketTokens> {
        self.guarded_read()?;
        self.inner.ticket_tokens(ticket_id).await
    }

    async fn lookup_submission(
        &self,
        submission_id: SubmissionId,
    ) -> LedgerResult<Option<TxReceipt>> {
        self.guarded_read()?;
        self.inner.lookup_submission(submission_id).await
    }
}
