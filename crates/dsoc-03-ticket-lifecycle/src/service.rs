//! Lifecycle Engine - two-phase write orchestration
//!
//! ```text
//! apply(intent)
//!   │
//!   ├─ 1. shape check, role registration, advisory precheck (index)
//!   ├─ 2. ledger submission ─── COMMIT POINT ───┐
//!   │      spawned task, bounded wait,           │ rejected → error, index untouched
//!   │      lookup_submission before re-submit    │ unknown  → error + pending entry
//!   ├─ 3. projection into the index with backoff
//!   │      exhausted → pending entry, Freshness::Stale
//!   └─ 4. event published, Applied returned
//! ```

use crate::domain::{
    precheck, settlement_plan, DistributionKind, Intent, RetryConfig, RewardDistribution,
};
use crate::error::{CommitState, LifecycleError, LifecycleResult};
use crate::ports::inbound::{
    Applied, Freshness, PendingOutcome, SubmissionStatus, TicketLifecycleApi,
};
use async_trait::async_trait;
use dsoc_01_ledger_client::{
    LedgerClient, LedgerError, RewardPlan, TxContext, TxKind, TxReceipt, TxResult,
};
use dsoc_02_index_store::{
    IndexError, IndexStore, PendingKey, PendingReconciliation, Projection, TicketProjection,
    WriteOutcome,
};
use parking_lot::Mutex;
use shared_bus::{DsocEvent, EventPublisher};
use shared_types::{
    Address, Amount, Digest, Role, SubmissionId, SystemTimeSource, TicketId, TicketMetadata,
    TicketSnapshot, TicketStatus, TimeSource, TokenId, TxId, UserRecord, ValidatorPolicy,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Longest wait for one ledger acknowledgement. The submission itself
    /// keeps running past it.
    pub ledger_timeout_ms: u64,
    /// Submissions of one intent, the first included
    pub ledger_max_attempts: u32,
    /// Backoff for projection writes; also paces ledger re-submissions
    pub index_retry: RetryConfig,
    /// Who validates submitted tickets
    pub validator_policy: ValidatorPolicy,
    pub distribution: DistributionKind,
    /// Owner of the platform share under a weighted split
    pub platform_address: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_timeout_ms: 10_000,
            ledger_max_attempts: 3,
            index_retry: RetryConfig::default(),
            validator_policy: ValidatorPolicy::Certifier,
            distribution: DistributionKind::Single,
            platform_address: Address::derive("dsoc-platform"),
        }
    }
}

impl EngineConfig {
    /// Short timeouts and delays for tests.
    pub fn for_testing() -> Self {
        Self {
            ledger_timeout_ms: 200,
            index_retry: RetryConfig::for_testing(),
            ..Self::default()
        }
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

/// One ledger submission, owned so it can move into a spawned task.
#[derive(Clone, Debug)]
enum LedgerCall {
    CreateStake {
        amount: Amount,
    },
    CreateTicket {
        evidence_hash: Digest,
        stake_token: TokenId,
    },
    Claim {
        ticket_id: TicketId,
    },
    SubmitReport {
        ticket_id: TicketId,
        report_hash: Digest,
    },
    Validate {
        ticket_id: TicketId,
        approved: bool,
        plan: RewardPlan,
    },
}

impl LedgerCall {
    async fn dispatch<L: LedgerClient + ?Sized>(self, ledger: &L, ctx: TxContext) -> TxResult {
        match self {
            LedgerCall::CreateStake { amount } => ledger.create_stake(ctx, amount).await,
            LedgerCall::CreateTicket {
                evidence_hash,
                stake_token,
            } => ledger.create_ticket(ctx, evidence_hash, stake_token).await,
            LedgerCall::Claim { ticket_id } => ledger.claim(ctx, ticket_id).await,
            LedgerCall::SubmitReport {
                ticket_id,
                report_hash,
            } => ledger.submit_report(ctx, ticket_id, report_hash).await,
            LedgerCall::Validate {
                ticket_id,
                approved,
                plan,
            } => ledger.validate(ctx, ticket_id, approved, plan).await,
        }
    }
}

/// Ledger-side view of a receipt, mirrored into the index.
fn projection_for(receipt: &TxReceipt, metadata: Option<TicketMetadata>) -> Projection {
    Projection {
        ticket: receipt.ticket.clone().map(|ticket| TicketProjection {
            ticket,
            last_tx: receipt.tx_id,
            metadata,
        }),
        stake_tokens: receipt.stake_token.clone().into_iter().collect(),
        rewards: receipt.rewards.clone(),
    }
}

/// Bus event announcing a committed transition.
fn event_for(receipt: &TxReceipt) -> Option<DsocEvent> {
    let tx_id = receipt.tx_id;
    match (receipt.kind, &receipt.ticket) {
        (TxKind::CreateStake, _) => receipt.stake_token.as_ref().map(|stake| {
            DsocEvent::StakeCreated {
                token_id: stake.token_id,
                owner: stake.owner,
                amount: stake.amount,
                tx_id,
            }
        }),
        (TxKind::CreateTicket, Some(ticket)) => Some(DsocEvent::TicketCreated {
            ticket_id: ticket.ticket_id,
            client: ticket.client,
            stake_amount: ticket.stake_amount,
            tx_id,
        }),
        (TxKind::Claim, Some(ticket)) => Some(DsocEvent::AnalystAssigned {
            ticket_id: ticket.ticket_id,
            analyst: receipt.sender,
            tx_id,
        }),
        (TxKind::SubmitReport, Some(ticket)) => {
            ticket
                .report_hash
                .map(|report_hash| DsocEvent::ReportSubmitted {
                    ticket_id: ticket.ticket_id,
                    analyst: receipt.sender,
                    report_hash,
                    tx_id,
                })
        }
        (TxKind::Validate, Some(ticket)) => Some(DsocEvent::TicketValidated {
            ticket_id: ticket.ticket_id,
            approved: ticket.status == TicketStatus::Approved,
            validator: receipt.sender,
            minted: receipt.minted(),
            refunded: receipt.refunded(),
            tx_id,
        }),
        _ => None,
    }
}

/// Ledger outcome of the in-flight submission behind a ticket entry.
enum InFlight {
    /// The entry records no unconfirmed submission.
    None,
    /// The submission has landed as `TxId`.
    Landed(TxId),
    /// The ledger does not know the submission yet.
    Outstanding,
}

/// Pending entries the index could not take.
type Backlog = Arc<Mutex<BTreeMap<PendingKey, PendingReconciliation>>>;

/// Ticket Lifecycle Engine
///
/// Holds no ticket state of its own: the ledger is authoritative and the
/// index is its projection. The only local state is the backlog of pending
/// entries recorded while the index was unreachable.
pub struct LifecycleEngine<L, S>
where
    L: LedgerClient,
    S: IndexStore,
{
    config: EngineConfig,
    ledger: Arc<L>,
    index: Arc<S>,
    distribution: Arc<dyn RewardDistribution>,
    events: Option<Arc<dyn EventPublisher>>,
    clock: Arc<dyn TimeSource>,
    backlog: Backlog,
}

impl<L, S> LifecycleEngine<L, S>
where
    L: LedgerClient + 'static,
    S: IndexStore + 'static,
{
    /// Create an engine using the distribution named in `config`.
    pub fn new(config: EngineConfig, ledger: Arc<L>, index: Arc<S>) -> LifecycleResult<Self> {
        let distribution = config.distribution.build(config.platform_address)?;
        Ok(Self {
            config,
            ledger,
            index,
            distribution,
            events: None,
            clock: Arc::new(SystemTimeSource),
            backlog: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    pub fn with_distribution(mut self, distribution: Arc<dyn RewardDistribution>) -> Self {
        self.distribution = distribution;
        self
    }

    /// Publish committed transitions on `events`.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn index(&self) -> &Arc<S> {
        &self.index
    }

    /// Entries held locally because the index refused them.
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }

    // =========================================================================
    // PHASE 1: VALIDATION
    // =========================================================================

    /// Index snapshot used for advisory checks. Read failures count as
    /// "unknown" since the ledger re-checks everything.
    async fn known_snapshot(&self, ticket_id: TicketId) -> Option<TicketSnapshot> {
        match self.index.get_ticket(ticket_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("[dsoc-03] precheck skipped for ticket {}: {}", ticket_id, e);
                None
            }
        }
    }

    async fn register_actor(&self, intent: &Intent) {
        let role = intent.actor_role(self.config.validator_policy);
        if let Err(e) = self.index.register_user(intent.sender(), role).await {
            debug!(
                "[dsoc-03] could not register {} as {}: {}",
                intent.sender().short(),
                role,
                e
            );
        }
    }

    /// Translate an intent into its ledger call. Validation needs the
    /// ticket's analyst and stake to build the reward plan.
    async fn ledger_call(
        &self,
        intent: &Intent,
        known: Option<&TicketSnapshot>,
    ) -> LifecycleResult<LedgerCall> {
        Ok(match intent {
            Intent::Stake { amount, .. } => LedgerCall::CreateStake { amount: *amount },
            Intent::CreateTicket {
                evidence_hash,
                stake_token,
                ..
            } => LedgerCall::CreateTicket {
                evidence_hash: *evidence_hash,
                stake_token: *stake_token,
            },
            Intent::Claim { ticket_id, .. } => LedgerCall::Claim {
                ticket_id: *ticket_id,
            },
            Intent::SubmitReport {
                ticket_id,
                report_hash,
                ..
            } => LedgerCall::SubmitReport {
                ticket_id: *ticket_id,
                report_hash: *report_hash,
            },
            Intent::Validate {
                validator,
                ticket_id,
                approved,
            } => {
                // Analyst and stake are fixed once Submitted, so a Submitted
                // snapshot is as good as a ledger read.
                let ticket = match known {
                    Some(s) if s.status() == TicketStatus::Submitted => Some(s.ticket.clone()),
                    _ => self.ledger.get_ticket(*ticket_id).await?,
                };
                let plan = match ticket {
                    Some(ticket) => settlement_plan(
                        self.distribution.as_ref(),
                        &ticket,
                        *validator,
                        *approved,
                    ),
                    None => RewardPlan::none(),
                };
                LedgerCall::Validate {
                    ticket_id: *ticket_id,
                    approved: *approved,
                    plan,
                }
            }
        })
    }

    // =========================================================================
    // PHASE 2: LEDGER COMMIT
    // =========================================================================

    /// Submit `call` until it commits, is rejected, or attempts run out.
    ///
    /// Each attempt runs as its own task; only the wait is bounded. Before a
    /// re-submission the ledger is asked whether the previous one landed.
    /// Every attempt reuses `ctx.submission_id`, so a late landing and a
    /// retry can never both apply.
    async fn submit(&self, call: LedgerCall, ctx: TxContext) -> LifecycleResult<TxReceipt> {
        let attempts = self.config.ledger_max_attempts.max(1);
        let timeout = self.config.ledger_timeout();
        let mut in_flight = false;
        let mut last_error = LedgerError::Unreachable {
            reason: "no attempt made".into(),
        };

        for attempt in 1..=attempts {
            let ledger = Arc::clone(&self.ledger);
            let attempt_call = call.clone();
            let handle =
                tokio::spawn(async move { attempt_call.dispatch(ledger.as_ref(), ctx).await });

            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(Ok(receipt))) => return Ok(receipt),
                Ok(Ok(Err(e))) if !e.is_transient() => {
                    return Err(LifecycleError::from_ledger(
                        e,
                        ctx.submission_id,
                        CommitState::NotCommitted,
                    ));
                }
                Ok(Ok(Err(e))) => last_error = e,
                Ok(Err(join_error)) => {
                    last_error = LedgerError::Unreachable {
                        reason: format!("submission task failed: {join_error}"),
                    };
                }
                Err(_) => {
                    in_flight = true;
                    last_error = LedgerError::Timeout {
                        waited_ms: self.config.ledger_timeout_ms,
                    };
                }
            }
            warn!(
                attempt,
                submission_id = %ctx.submission_id,
                "[dsoc-03] ledger submission failed: {}",
                last_error
            );

            match tokio::time::timeout(timeout, self.ledger.lookup_submission(ctx.submission_id))
                .await
            {
                Ok(Ok(Some(receipt))) => {
                    info!(
                        submission_id = %ctx.submission_id,
                        "[dsoc-03] submission landed despite failed acknowledgement"
                    );
                    return Ok(receipt);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!("[dsoc-03] submission lookup failed: {}", e);
                    return Err(LifecycleError::from_ledger(
                        last_error,
                        ctx.submission_id,
                        CommitState::Unknown,
                    ));
                }
                Err(_) => {
                    return Err(LifecycleError::from_ledger(
                        last_error,
                        ctx.submission_id,
                        CommitState::Unknown,
                    ));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.index_retry.delay_for(attempt)).await;
            }
        }

        let commit_state = if in_flight {
            CommitState::Unknown
        } else {
            CommitState::NotCommitted
        };
        Err(LifecycleError::from_ledger(
            last_error,
            ctx.submission_id,
            commit_state,
        ))
    }

    // =========================================================================
    // PHASE 3: PROJECTION
    // =========================================================================

    /// Write `projection` with bounded backoff. The ledger is never touched.
    async fn project(&self, projection: &Projection) -> Result<WriteOutcome, IndexError> {
        let retry = &self.config.index_retry;
        let mut attempt = 0;
        loop {
            match self.index.apply_projection(projection.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt >= retry.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    debug!(attempt, "[dsoc-03] projection failed, retrying: {}", e);
                    tokio::time::sleep(retry.delay_for(attempt)).await;
                }
            }
        }
    }

    /// Queue a divergence, in the index if it is reachable, locally otherwise.
    async fn record_pending(&self, entry: PendingReconciliation) {
        let key = entry.key;
        if let Err(e) = self.index.record_reconciliation_pending(entry.clone()).await {
            warn!(
                "[dsoc-03] index refused pending entry {}, keeping it locally: {}",
                key, e
            );
            let mut entry = entry;
            let mut backlog = self.backlog.lock();
            match backlog.get_mut(&key) {
                Some(existing) => existing.merge(entry),
                None => {
                    entry.recorded_at = self.clock.now();
                    backlog.insert(key, entry);
                }
            }
        }
    }

    /// Clear `expected` unless a newer divergence has been folded into it
    /// since it was read.
    async fn clear_pending_if(&self, expected: &PendingReconciliation) {
        {
            let mut backlog = self.backlog.lock();
            if backlog
                .get(&expected.key)
                .is_some_and(|local| local.same_divergence(expected))
            {
                backlog.remove(&expected.key);
            }
        }
        match self.index.clear_reconciliation_pending_if(expected).await {
            Ok(true) => {}
            Ok(false) => debug!(
                key = %expected.key,
                "[dsoc-03] pending entry kept, newer divergence or already cleared"
            ),
            Err(e) => warn!(
                "[dsoc-03] could not clear pending entry {}: {}",
                expected.key, e
            ),
        }
    }

    async fn clear_pending(&self, key: PendingKey) {
        self.backlog.lock().remove(&key);
        if let Err(e) = self.index.clear_reconciliation_pending(key).await {
            warn!("[dsoc-03] could not clear pending entry {}: {}", key, e);
        }
    }

    /// Pending entry for `key`, from the index or the local backlog.
    async fn find_pending(&self, key: PendingKey) -> Option<PendingReconciliation> {
        let local = self.backlog.lock().get(&key).cloned();
        if local.is_some() {
            return local;
        }
        match self.index.pending_reconciliations().await {
            Ok(entries) => entries.into_iter().find(|e| e.key == key),
            Err(_) => None,
        }
    }

    async fn publish(&self, event: DsocEvent) {
        if let Some(events) = &self.events {
            let receivers = events.publish(event).await;
            debug!(receivers, "[dsoc-03] event published");
        }
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Overwrite the index entry of `ticket_id` with ledger state.
    ///
    /// Metadata already indexed is kept; otherwise `metadata` (carried by a
    /// pending entry) is used.
    async fn reconcile_ticket(
        &self,
        ticket_id: TicketId,
        metadata: Option<TicketMetadata>,
        last_tx: Option<TxId>,
    ) -> LifecycleResult<TicketSnapshot> {
        let ticket = self
            .ledger
            .get_ticket(ticket_id)
            .await?
            .ok_or(LifecycleError::TicketNotFound { ticket_id })?;
        let tokens = self.ledger.ticket_tokens(ticket_id).await?;
        let existing = self.index.get_ticket(ticket_id).await?;

        let last_tx = match (&existing, last_tx) {
            (Some(e), _) if e.version() == ticket.version => e.last_tx,
            (_, Some(tx)) => tx,
            (Some(e), None) => e.last_tx,
            (None, None) => TxId::default(),
        };
        let ticket_projection = TicketProjection {
            ticket,
            last_tx,
            metadata: if existing.is_some() { None } else { metadata },
        };
        let snapshot = ticket_projection
            .clone()
            .into_snapshot(existing.as_ref(), self.clock.now());

        let projection = Projection {
            ticket: Some(ticket_projection),
            stake_tokens: tokens.stake.into_iter().collect(),
            rewards: tokens.rewards,
        };
        self.index
            .apply_projection(projection)
            .await
            .map_err(|e| LifecycleError::IndexWriteFailed {
                reason: e.to_string(),
            })?;

        info!(
            ticket_id,
            version = snapshot.version(),
            "[dsoc-03] reconciled ticket from ledger"
        );
        self.publish(DsocEvent::Reconciled {
            ticket_id,
            version: snapshot.version(),
        })
        .await;
        Ok(snapshot)
    }

    async fn resolve_submission(
        &self,
        submission_id: SubmissionId,
        metadata: Option<TicketMetadata>,
    ) -> LifecycleResult<SubmissionStatus> {
        let Some(receipt) = self.ledger.lookup_submission(submission_id).await? else {
            debug!(%submission_id, "[dsoc-03] submission still unknown to the ledger");
            return Ok(SubmissionStatus::Unknown);
        };

        match receipt.ticket_id() {
            Some(ticket_id) => {
                self.reconcile_ticket(ticket_id, metadata, Some(receipt.tx_id))
                    .await?;
            }
            None => {
                self.index
                    .apply_projection(projection_for(&receipt, None))
                    .await
                    .map_err(|e| LifecycleError::IndexWriteFailed {
                        reason: e.to_string(),
                    })?;
            }
        }
        self.clear_pending(PendingKey::Submission(submission_id)).await;
        info!(
            %submission_id,
            tx_id = %receipt.tx_id,
            "[dsoc-03] resolved submission"
        );
        Ok(SubmissionStatus::Committed {
            tx_id: receipt.tx_id,
            ticket_id: receipt.ticket_id(),
        })
    }

    /// Whether the submission recorded on a ticket entry has landed.
    ///
    /// An entry with a submission but no transition stems from an
    /// unconfirmed write. Until the ledger knows that submission, a ledger
    /// read cannot show its effect.
    async fn in_flight(&self, entry: &PendingReconciliation) -> LifecycleResult<InFlight> {
        let (None, Some(submission_id)) = (entry.last_tx, entry.submission_id) else {
            return Ok(InFlight::None);
        };
        Ok(match self.ledger.lookup_submission(submission_id).await? {
            Some(receipt) => InFlight::Landed(receipt.tx_id),
            None => InFlight::Outstanding,
        })
    }

    /// Repair a ticket entry once its submission, if any, has landed.
    /// Returns `false` while the submission is outstanding.
    async fn repair_ticket_entry(
        &self,
        ticket_id: TicketId,
        entry: &PendingReconciliation,
    ) -> LifecycleResult<bool> {
        let last_tx = match self.in_flight(entry).await? {
            InFlight::None => entry.last_tx,
            InFlight::Landed(tx_id) => Some(tx_id),
            InFlight::Outstanding => return Ok(false),
        };
        self.reconcile_ticket(ticket_id, entry.metadata.clone(), last_tx)
            .await?;
        self.clear_pending_if(entry).await;
        Ok(true)
    }

    /// Raise the attempt count of an entry that could not be repaired.
    ///
    /// Only the count and reason are sent: anything a concurrent writer
    /// folded into the stored entry meanwhile is kept.
    async fn bump_attempts(&self, entry: &PendingReconciliation, reason: String) -> u32 {
        let attempts = entry.attempts.saturating_add(1);
        let mut update =
            PendingReconciliation::new(entry.key, reason).with_metadata(entry.metadata.clone());
        update.attempts = attempts;
        self.record_pending(update).await;
        attempts
    }
}

#[async_trait]
impl<L, S> TicketLifecycleApi for LifecycleEngine<L, S>
where
    L: LedgerClient + 'static,
    S: IndexStore + 'static,
{
    async fn apply(&self, intent: Intent) -> LifecycleResult<Applied> {
        intent.check_shape()?;
        self.register_actor(&intent).await;

        let known = match intent.ticket_id() {
            Some(ticket_id) => self.known_snapshot(ticket_id).await,
            None => None,
        };
        precheck(&intent, known.as_ref(), self.config.validator_policy)?;

        let call = self.ledger_call(&intent, known.as_ref()).await?;
        let ctx = TxContext::new(intent.sender());
        let metadata = match &intent {
            Intent::CreateTicket { metadata, .. } => Some(metadata.clone()),
            _ => None,
        };

        let receipt = match self.submit(call, ctx).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if e.commit_state() == Some(CommitState::Unknown) {
                    let key = intent
                        .ticket_id()
                        .map_or(PendingKey::Submission(ctx.submission_id), PendingKey::Ticket);
                    warn!(
                        %key,
                        submission_id = %ctx.submission_id,
                        "[dsoc-03] {} outcome unknown, queued for reconciliation",
                        intent.name()
                    );
                    self.record_pending(
                        PendingReconciliation::new(key, e.to_string())
                            .with_submission(ctx.submission_id)
                            .with_metadata(metadata),
                    )
                    .await;
                }
                return Err(e);
            }
        };
        info!(
            ticket_id = ?receipt.ticket_id(),
            tx_id = %receipt.tx_id,
            submission_id = %ctx.submission_id,
            "[dsoc-03] {} committed at sequence {}",
            intent.name(),
            receipt.sequence
        );

        let projection = projection_for(&receipt, metadata.clone());
        let freshness = match self.project(&projection).await {
            Ok(WriteOutcome::Applied) => Freshness::Fresh,
            Ok(WriteOutcome::Stale { stored_version }) => {
                debug!(
                    stored_version,
                    "[dsoc-03] index already holds a newer projection"
                );
                Freshness::Fresh
            }
            Err(e) => {
                let key = receipt
                    .ticket_id()
                    .map_or(PendingKey::Submission(ctx.submission_id), PendingKey::Ticket);
                let attempts = self.config.index_retry.max_retries.saturating_add(1);
                warn!(
                    %key,
                    tx_id = %receipt.tx_id,
                    attempts,
                    "[dsoc-03] projection failed, returning stale success: {}",
                    e
                );
                self.record_pending(
                    PendingReconciliation::new(key, e.to_string())
                        .with_last_tx(receipt.tx_id)
                        .with_submission(ctx.submission_id)
                        .with_metadata(metadata),
                )
                .await;
                self.publish(DsocEvent::ProjectionStale {
                    key: key.to_string(),
                    tx_id: Some(receipt.tx_id),
                    attempts,
                })
                .await;
                Freshness::Stale { pending: key }
            }
        };

        if let Some(event) = event_for(&receipt) {
            self.publish(event).await;
        }

        let now = self.clock.now();
        let snapshot = projection
            .ticket
            .map(|ticket| ticket.into_snapshot(known.as_ref(), now));
        Ok(Applied {
            tx_id: receipt.tx_id,
            submission_id: ctx.submission_id,
            snapshot,
            stake_token: receipt.stake_token,
            minted: receipt.rewards,
            freshness,
        })
    }

    async fn reconcile(&self, ticket_id: TicketId) -> LifecycleResult<TicketSnapshot> {
        let Some(entry) = self.find_pending(PendingKey::Ticket(ticket_id)).await else {
            return self.reconcile_ticket(ticket_id, None, None).await;
        };
        let last_tx = match self.in_flight(&entry).await? {
            InFlight::None => entry.last_tx,
            InFlight::Landed(tx_id) => Some(tx_id),
            InFlight::Outstanding => {
                debug!(
                    ticket_id,
                    "[dsoc-03] submission still outstanding, pending entry kept"
                );
                return self.reconcile_ticket(ticket_id, entry.metadata, None).await;
            }
        };
        let snapshot = self
            .reconcile_ticket(ticket_id, entry.metadata.clone(), last_tx)
            .await?;
        self.clear_pending_if(&entry).await;
        Ok(snapshot)
    }

    async fn reconcile_submission(
        &self,
        submission_id: SubmissionId,
    ) -> LifecycleResult<SubmissionStatus> {
        let metadata = self
            .find_pending(PendingKey::Submission(submission_id))
            .await
            .and_then(|p| p.metadata);
        self.resolve_submission(submission_id, metadata).await
    }

    async fn reconcile_pending(
        &self,
        entry: PendingReconciliation,
    ) -> LifecycleResult<PendingOutcome> {
        let result = match entry.key {
            PendingKey::Ticket(ticket_id) => self.repair_ticket_entry(ticket_id, &entry).await,
            PendingKey::Submission(submission_id) => self
                .resolve_submission(submission_id, entry.metadata.clone())
                .await
                .map(|status| matches!(status, SubmissionStatus::Committed { .. })),
        };

        match result {
            Ok(true) => Ok(PendingOutcome::Repaired),
            Ok(false) => {
                let attempts = self
                    .bump_attempts(&entry, "submission not found on ledger".into())
                    .await;
                Ok(PendingOutcome::StillPending { attempts })
            }
            Err(e) => {
                self.bump_attempts(&entry, e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn discard_pending(&self, key: PendingKey) -> LifecycleResult<()> {
        self.backlog.lock().remove(&key);
        self.index.clear_reconciliation_pending(key).await?;
        Ok(())
    }

    async fn get_snapshot(&self, ticket_id: TicketId) -> LifecycleResult<Option<TicketSnapshot>> {
        Ok(self.index.get_ticket(ticket_id).await?)
    }

    async fn register_user(&self, address: Address, role: Role) -> LifecycleResult<UserRecord> {
        Ok(self.index.register_user(address, role).await?)
    }

    async fn pending_reconciliations(&self) -> LifecycleResult<Vec<PendingReconciliation>> {
        let local: Vec<PendingReconciliation> = self.backlog.lock().values().cloned().collect();
        let indexed = match self.index.pending_reconciliations().await {
            Ok(entries) => entries,
            Err(e) if !local.is_empty() => {
                warn!("[dsoc-03] index pending list unavailable: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut merged: BTreeMap<PendingKey, PendingReconciliation> = BTreeMap::new();
        for entry in indexed.into_iter().chain(local) {
            match merged.get_mut(&entry.key) {
                Some(existing) => existing.merge(entry),
                None => {
                    merged.insert(entry.key, entry);
                }
            }
        }
        Ok(merged.into_values().collect())
    }
}
