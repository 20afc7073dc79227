//! In-memory ledger simulator
//!
//! Reproduces the ticket contract's rules behind the `LedgerClient` port.
//! All state lives behind one mutex, so each write is atomic and conflicting
//! writes are serialized: of N concurrent claims exactly one commits.

use crate::domain::{
    LedgerEvent, RawTicketRecord, RewardPlan, TicketTokens, TxContext, TxKind, TxReceipt,
};
use crate::error::{LedgerError, LedgerResult, RejectReason};
use crate::ports::outbound::{LedgerClient, TxResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    Address, Amount, Digest, LedgerTicket, RewardToken, StakeSettlement, StakeToken,
    SubmissionId, TicketId, TicketStatus, TokenId, TxId, ValidatorPolicy,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Simulator configuration
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Id given to the first ticket
    pub first_ticket_id: TicketId,
    /// Who may validate submitted tickets
    pub validator_policy: ValidatorPolicy,
    /// Addresses allowed to validate under the certifier policy
    pub certifiers: Vec<Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            first_ticket_id: 1,
            validator_policy: ValidatorPolicy::Certifier,
            certifiers: Vec::new(),
        }
    }
}

struct LedgerState {
    sequence: u64,
    next_ticket_id: TicketId,
    next_token_id: TokenId,
    tickets: BTreeMap<TicketId, RawTicketRecord>,
    stakes: BTreeMap<TokenId, StakeToken>,
    rewards: BTreeMap<TokenId, RewardToken>,
    submissions: HashMap<SubmissionId, TxReceipt>,
    certifiers: HashSet<Address>,
    validator_policy: ValidatorPolicy,
}

impl LedgerState {
    fn ticket(&self, ticket_id: TicketId) -> LedgerResult<LedgerTicket> {
        self.tickets
            .get(&ticket_id)
            .ok_or(RejectReason::TicketNotFound { ticket_id })?
            .decode()
    }

    fn store_ticket(&mut self, ticket: &LedgerTicket) {
        self.tickets
            .insert(ticket.ticket_id, RawTicketRecord::encode(ticket));
    }

    fn next_token(&mut self) -> TokenId {
        let id = self.next_token_id;
        self.next_token_id += 1;
        id
    }

    /// Commit a transition: assign the next sequence, build and remember the
    /// receipt under the submission id.
    fn commit(
        &mut self,
        ctx: &TxContext,
        kind: TxKind,
        ticket: Option<LedgerTicket>,
        stake_token: Option<StakeToken>,
        rewards: Vec<RewardToken>,
        events: Vec<LedgerEvent>,
    ) -> TxReceipt {
        let receipt = TxReceipt {
            tx_id: TxId::derive(self.sequence, &ctx.submission_id),
            submission_id: ctx.submission_id,
            sequence: self.sequence,
            kind,
            sender: ctx.sender,
            ticket,
            stake_token,
            rewards,
            events,
        };
        self.submissions
            .insert(ctx.submission_id, receipt.clone());
        debug!(
            "[dsoc-01] committed {:?} seq={} tx={} submission={}",
            kind, receipt.sequence, receipt.tx_id, ctx.submission_id
        );
        receipt
    }
}

/// In-memory simulation of the ticket contract.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                sequence: 0,
                next_ticket_id: config.first_ticket_id,
                next_token_id: 1,
                tickets: BTreeMap::new(),
                stakes: BTreeMap::new(),
                rewards: BTreeMap::new(),
                submissions: HashMap::new(),
                certifiers: config.certifiers.into_iter().collect(),
                validator_policy: config.validator_policy,
            }),
        }
    }

    /// Allow `address` to validate under the certifier policy.
    pub fn register_certifier(&self, address: Address) {
        self.state.lock().certifiers.insert(address);
    }

    pub fn validator_policy(&self) -> ValidatorPolicy {
        self.state.lock().validator_policy
    }

    /// Last committed sequence number.
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }

    /// Number of committed transitions.
    pub fn committed_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    pub fn stake_token(&self, token_id: TokenId) -> Option<StakeToken> {
        self.state.lock().stakes.get(&token_id).cloned()
    }

    /// Every reward token minted so far.
    pub fn reward_tokens(&self) -> Vec<RewardToken> {
        self.state.lock().rewards.values().cloned().collect()
    }

    /// Ids of every ticket on the ledger.
    pub fn ticket_ids(&self) -> Vec<TicketId> {
        self.state.lock().tickets.keys().copied().collect()
    }

    /// Overwrite the raw status code of a stored ticket.
    ///
    /// Used to exercise decoding of corrupt records at the client boundary.
    pub fn overwrite_status_code(&self, ticket_id: TicketId, code: u8) -> bool {
        match self.state.lock().tickets.get_mut(&ticket_id) {
            Some(raw) => {
                raw.status_code = code;
                true
            }
            None => false,
        }
    }

    /// Run `apply` under the state lock unless the submission already
    /// committed, in which case its receipt is replayed.
    fn write<F>(&self, ctx: &TxContext, apply: F) -> TxResult
    where
        F: FnOnce(&mut LedgerState) -> TxResult,
    {
        let mut state = self.state.lock();
        if let Some(receipt) = state.submissions.get(&ctx.submission_id) {
            debug!(
                "[dsoc-01] replaying receipt for submission {}",
                ctx.submission_id
            );
            return Ok(receipt.clone());
        }
        state.sequence += 1;
        let result = apply(&mut state);
        if result.is_err() {
            state.sequence -= 1;
        }
        result
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

fn reject(reason: RejectReason) -> TxResult {
    Err(LedgerError::Rejected(reason))
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn create_stake(&self, ctx: TxContext, amount: Amount) -> TxResult {
        tokio::task::yield_now().await;
        self.write(&ctx, |state| {
            if amount == 0 {
                return reject(RejectReason::ZeroAmount);
            }
            let token = StakeToken {
                token_id: state.next_token(),
                owner: ctx.sender,
                amount,
                is_used: false,
                locked_for: None,
                settlement: None,
                version: state.sequence,
            };
            state.stakes.insert(token.token_id, token.clone());
            let events = vec![LedgerEvent::StakeCreated {
                token_id: token.token_id,
                owner: token.owner,
                amount,
            }];
            Ok(state.commit(&ctx, TxKind::CreateStake, None, Some(token), vec![], events))
        })
    }

    async fn create_ticket(
        &self,
        ctx: TxContext,
        evidence_hash: Digest,
        stake_token: TokenId,
    ) -> TxResult {
        tokio::task::yield_now().await;
        self.write(&ctx, |state| {
            if evidence_hash.is_zero() {
                return reject(RejectReason::EmptyDigest);
            }
            let sequence = state.sequence;
            let ticket_id = state.next_ticket_id;
            let stake = state
                .stakes
                .get_mut(&stake_token)
                .ok_or(RejectReason::StakeNotFound {
                    token_id: stake_token,
                })?;
            if stake.owner != ctx.sender {
                return reject(RejectReason::NotStakeOwner {
                    token_id: stake_token,
                });
            }
            if stake.is_used {
                return reject(RejectReason::DoubleSpend {
                    token_id: stake_token,
                });
            }

            stake.is_used = true;
            stake.locked_for = Some(ticket_id);
            stake.version = sequence;
            let stake = stake.clone();

            let ticket = LedgerTicket {
                ticket_id,
                client: ctx.sender,
                analyst: None,
                evidence_hash,
                report_hash: None,
                status: TicketStatus::Open,
                stake_amount: stake.amount,
                stake_token,
                validated_by: None,
                version: sequence,
            };
            state.next_ticket_id += 1;
            state.store_ticket(&ticket);

            let events = vec![LedgerEvent::TicketCreated {
                ticket_id,
                client: ctx.sender,
                stake: stake.amount,
            }];
            Ok(state.commit(
                &ctx,
                TxKind::CreateTicket,
                Some(ticket),
                Some(stake),
                vec![],
                events,
            ))
        })
    }

    async fn claim(&self, ctx: TxContext, ticket_id: TicketId) -> TxResult {
        tokio::task::yield_now().await;
        self.write(&ctx, |state| {
            let mut ticket = state.ticket(ticket_id)?;
            match (ticket.status, ticket.analyst) {
                (TicketStatus::Open, None) => {}
                (TicketStatus::Claimed, Some(analyst)) => {
                    return reject(RejectReason::AlreadyClaimed { ticket_id, analyst })
                }
                (status, _) => {
                    return reject(RejectReason::WrongStatus {
                        ticket_id,
                        status,
                        expected: TicketStatus::Open,
                    })
                }
            }
            if ticket.client == ctx.sender {
                return reject(RejectReason::SelfDealing { ticket_id });
            }

            ticket.status = TicketStatus::Claimed;
            ticket.analyst = Some(ctx.sender);
            ticket.version = state.sequence;
            state.store_ticket(&ticket);

            let events = vec![LedgerEvent::TicketAssigned {
                ticket_id,
                analyst: ctx.sender,
            }];
            Ok(state.commit(&ctx, TxKind::Claim, Some(ticket), None, vec![], events))
        })
    }

    async fn submit_report(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        report_hash: Digest,
    ) -> TxResult {
        tokio::task::yield_now().await;
        self.write(&ctx, |state| {
            let mut ticket = state.ticket(ticket_id)?;
            if ticket.status != TicketStatus::Claimed {
                return reject(RejectReason::WrongStatus {
                    ticket_id,
                    status: ticket.status,
                    expected: TicketStatus::Claimed,
                });
            }
            if ticket.analyst != Some(ctx.sender) {
                return reject(RejectReason::NotAssignedAnalyst { ticket_id });
            }
            if report_hash.is_zero() {
                return reject(RejectReason::EmptyDigest);
            }

            ticket.status = TicketStatus::Submitted;
            ticket.report_hash = Some(report_hash);
            ticket.version = state.sequence;
            state.store_ticket(&ticket);

            let events = vec![LedgerEvent::ReportSubmitted {
                ticket_id,
                analyst: ctx.sender,
                report_hash,
            }];
            Ok(state.commit(&ctx, TxKind::SubmitReport, Some(ticket), None, vec![], events))
        })
    }

    async fn validate(
        &self,
        ctx: TxContext,
        ticket_id: TicketId,
        approved: bool,
        plan: RewardPlan,
    ) -> TxResult {
        tokio::task::yield_now().await;
        self.write(&ctx, |state| {
            let mut ticket = state.ticket(ticket_id)?;
            if ticket.status != TicketStatus::Submitted {
                return reject(RejectReason::WrongStatus {
                    ticket_id,
                    status: ticket.status,
                    expected: TicketStatus::Submitted,
                });
            }
            let policy = state.validator_policy;
            let authorized = match policy {
                ValidatorPolicy::Certifier => state.certifiers.contains(&ctx.sender),
                ValidatorPolicy::Client => ticket.client == ctx.sender,
            };
            if !authorized {
                return reject(RejectReason::NotValidator { ticket_id, policy });
            }
            if ticket.analyst == Some(ctx.sender) {
                return reject(RejectReason::SelfDealing { ticket_id });
            }

            let expected = if approved { ticket.stake_amount } else { 0 };
            if plan.total() != expected {
                return reject(RejectReason::DistributionMismatch {
                    ticket_id,
                    expected,
                    actual: plan.total(),
                });
            }
            if plan.shares.iter().any(|share| share.amount == 0) {
                return reject(RejectReason::ZeroAmount);
            }

            let sequence = state.sequence;
            let mut stake = state
                .stakes
                .get(&ticket.stake_token)
                .cloned()
                .ok_or(RejectReason::StakeNotFound {
                    token_id: ticket.stake_token,
                })?;

            let mut events = vec![LedgerEvent::TicketValidated {
                ticket_id,
                approved,
            }];
            let mut minted = Vec::with_capacity(plan.shares.len());
            if approved {
                for share in plan.shares {
                    let token = RewardToken {
                        token_id: state.next_token(),
                        owner: share.owner,
                        amount: share.amount,
                        ticket_id,
                        kind: share.kind,
                        version: sequence,
                    };
                    events.push(LedgerEvent::RewardMinted {
                        token_id: token.token_id,
                        owner: token.owner,
                        amount: token.amount,
                    });
                    state.rewards.insert(token.token_id, token.clone());
                    minted.push(token);
                }
                stake.settlement = Some(StakeSettlement::Converted);
            } else {
                events.push(LedgerEvent::StakeRefunded {
                    token_id: stake.token_id,
                    owner: stake.owner,
                    amount: stake.amount,
                });
                stake.settlement = Some(StakeSettlement::Refunded);
            }
            stake.version = sequence;
            state.stakes.insert(stake.token_id, stake.clone());

            ticket.status = if approved {
                TicketStatus::Approved
            } else {
                TicketStatus::Rejected
            };
            ticket.validated_by = Some(ctx.sender);
            ticket.version = sequence;
            state.store_ticket(&ticket);

            Ok(state.commit(
                &ctx,
                TxKind::Validate,
                Some(ticket),
                Some(stake),
                minted,
                events,
            ))
        })
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> LedgerResult<Option<LedgerTicket>> {
        let state = self.state.lock();
        state
            .tickets
            .get(&ticket_id)
            .map(RawTicketRecord::decode)
            .transpose()
    }

    async fn ticket_tokens(&self, ticket_id: TicketId) -> LedgerResult<TicketTokens> {
        let state = self.state.lock();
        let Some(raw) = state.tickets.get(&ticket_id) else {
            return Ok(TicketTokens::default());
        };
        Ok(TicketTokens {
            stake: state.stakes.get(&raw.stake_token).cloned(),
            rewards: state
                .rewards
                .values()
                .filter(|r| r.ticket_id == ticket_id)
                .cloned()
                .collect(),
        })
    }

    async fn lookup_submission(
        &self,
        submission_id: SubmissionId,
    ) -> LedgerResult<Option<TxReceipt>> {
        Ok(self.state.lock().submissions.get(&submission_id).cloned())
    }
}
