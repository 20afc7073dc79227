//! In-memory index store
//!
//! One `RwLock` over all tables: readers run concurrently, a projection is
//! applied under a single write guard so its records land together.

use crate::domain::{
    version_admits, PendingKey, PendingReconciliation, Projection, WriteOutcome,
};
use crate::error::IndexResult;
use crate::ports::outbound::IndexStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Address, Balances, RewardToken, Role, StakeToken, SystemTimeSource, TicketId,
    TicketSnapshot, TicketStatus, TimeSource, TokenId, UserRecord,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct IndexState {
    tickets: BTreeMap<TicketId, TicketSnapshot>,
    stake_tokens: BTreeMap<TokenId, StakeToken>,
    reward_tokens: BTreeMap<TokenId, RewardToken>,
    owner_index: HashMap<Address, BTreeSet<TokenId>>,
    users: HashMap<Address, UserRecord>,
    pending: BTreeMap<PendingKey, PendingReconciliation>,
}

impl IndexState {
    fn put_ticket(&mut self, snapshot: TicketSnapshot) -> WriteOutcome {
        let stored = self.tickets.get(&snapshot.ticket_id()).map(|s| s.version());
        if !version_admits(stored, snapshot.version()) {
            let stored_version = stored.unwrap_or_default();
            debug!(
                "[dsoc-02] discarding stale write for ticket {} (v{} < v{})",
                snapshot.ticket_id(),
                snapshot.version(),
                stored_version
            );
            return WriteOutcome::Stale { stored_version };
        }
        self.tickets.insert(snapshot.ticket_id(), snapshot);
        WriteOutcome::Applied
    }

    fn put_stake(&mut self, token: StakeToken) {
        let stored = self.stake_tokens.get(&token.token_id).map(|t| t.version);
        if version_admits(stored, token.version) {
            self.owner_index
                .entry(token.owner)
                .or_default()
                .insert(token.token_id);
            self.stake_tokens.insert(token.token_id, token);
        }
    }

    fn put_reward(&mut self, token: RewardToken) {
        // Append-only
        if self.reward_tokens.contains_key(&token.token_id) {
            return;
        }
        self.owner_index
            .entry(token.owner)
            .or_default()
            .insert(token.token_id);
        self.reward_tokens.insert(token.token_id, token);
    }

    fn owned_ids(&self, owner: &Address) -> impl Iterator<Item = &TokenId> {
        self.owner_index.get(owner).into_iter().flatten()
    }
}

fn newest_first<'a>(tickets: impl Iterator<Item = &'a TicketSnapshot>) -> Vec<TicketSnapshot> {
    let mut out: Vec<TicketSnapshot> = tickets.cloned().collect();
    out.sort_by(|a, b| b.ticket_id().cmp(&a.ticket_id()));
    out
}

/// In-memory implementation of `IndexStore`.
pub struct InMemoryIndexStore {
    state: RwLock<IndexState>,
    clock: Arc<dyn TimeSource>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemTimeSource))
    }

    pub fn with_clock(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            clock,
        }
    }

    pub fn ticket_count(&self) -> usize {
        self.state.read().tickets.len()
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn upsert_ticket(&self, snapshot: TicketSnapshot) -> IndexResult<WriteOutcome> {
        Ok(self.state.write().put_ticket(snapshot))
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> IndexResult<Option<TicketSnapshot>> {
        Ok(self.state.read().tickets.get(&ticket_id).cloned())
    }

    async fn query_tickets_by_role(
        &self,
        address: Address,
        role: Role,
    ) -> IndexResult<Vec<TicketSnapshot>> {
        let state = self.state.read();
        Ok(newest_first(
            state.tickets.values().filter(|t| t.involves(&address, role)),
        ))
    }

    async fn tickets_by_status(&self, status: TicketStatus) -> IndexResult<Vec<TicketSnapshot>> {
        let state = self.state.read();
        Ok(newest_first(
            state.tickets.values().filter(|t| t.status() == status),
        ))
    }

    async fn list_tickets(&self) -> IndexResult<Vec<TicketSnapshot>> {
        Ok(newest_first(self.state.read().tickets.values()))
    }

    async fn apply_projection(&self, projection: Projection) -> IndexResult<WriteOutcome> {
        let now = self.clock.now();
        let mut state = self.state.write();

        let outcome = match projection.ticket {
            Some(ticket) => {
                let existing = state.tickets.get(&ticket.ticket.ticket_id);
                let snapshot = ticket.into_snapshot(existing, now);
                state.put_ticket(snapshot)
            }
            None => WriteOutcome::Applied,
        };
        for token in projection.stake_tokens {
            state.put_stake(token);
        }
        for token in projection.rewards {
            state.put_reward(token);
        }
        Ok(outcome)
    }

    async fn stake_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<StakeToken>> {
        let state = self.state.read();
        Ok(state
            .owned_ids(&owner)
            .filter_map(|id| state.stake_tokens.get(id))
            .cloned()
            .collect())
    }

    async fn reward_tokens_by_owner(&self, owner: Address) -> IndexResult<Vec<RewardToken>> {
        let state = self.state.read();
        Ok(state
            .owned_ids(&owner)
            .filter_map(|id| state.reward_tokens.get(id))
            .cloned()
            .collect())
    }

    async fn register_user(&self, address: Address, role: Role) -> IndexResult<UserRecord> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let record = state.users.entry(address).or_insert_with(|| {
            debug!("[dsoc-02] registered {} as {}", address.short(), role);
            UserRecord {
                address,
                role,
                registered_at: now,
            }
        });
        Ok(record.clone())
    }

    async fn get_user(&self, address: Address) -> IndexResult<Option<UserRecord>> {
        Ok(self.state.read().users.get(&address).cloned())
    }

    async fn balances(&self, address: Address) -> IndexResult<Balances> {
        let state = self.state.read();
        let stakes = state
            .owned_ids(&address)
            .filter_map(|id| state.stake_tokens.get(id));
        let rewards = state
            .owned_ids(&address)
            .filter_map(|id| state.reward_tokens.get(id));
        Ok(Balances::from_tokens(stakes, rewards))
    }

    async fn record_reconciliation_pending(
        &self,
        mut entry: PendingReconciliation,
    ) -> IndexResult<()> {
        let now = self.clock.now();
        let mut state = self.state.write();
        match state.pending.get_mut(&entry.key) {
            Some(existing) => existing.merge(entry),
            None => {
                entry.recorded_at = now;
                state.pending.insert(entry.key, entry);
            }
        }
        Ok(())
    }

    async fn clear_reconciliation_pending(&self, key: PendingKey) -> IndexResult<()> {
        self.state.write().pending.remove(&key);
        Ok(())
    }

    async fn clear_reconciliation_pending_if(
        &self,
        expected: &PendingReconciliation,
    ) -> IndexResult<bool> {
        let mut state = self.state.write();
        match state.pending.get(&expected.key) {
            Some(stored) if stored.same_divergence(expected) => {
                state.pending.remove(&expected.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_reconciliations(&self) -> IndexResult<Vec<PendingReconciliation>> {
        Ok(self.state.read().pending.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TicketProjection;
    use shared_types::{
        Digest, LedgerTicket, RewardKind, StakeSettlement, SubmissionId, TicketMetadata, TxId,
    };

    fn client() -> Address {
        Address::derive("client")
    }
    fn analyst() -> Address {
        Address::derive("analyst")
    }

    fn ledger_ticket(ticket_id: TicketId, status: TicketStatus, version: u64) -> LedgerTicket {
        let progressed = status != TicketStatus::Open;
        LedgerTicket {
            ticket_id,
            client: client(),
            analyst: progressed.then(analyst),
            evidence_hash: Digest::of(b"evidence"),
            report_hash: (status.rank() >= 2).then(|| Digest::of(b"report")),
            status,
            stake_amount: 500,
            stake_token: ticket_id,
            validated_by: status.is_terminal().then(|| Address::derive("certifier")),
            version,
        }
    }

    fn projection(ticket: LedgerTicket, metadata: Option<TicketMetadata>) -> Projection {
        Projection {
            ticket: Some(TicketProjection {
                last_tx: TxId::derive(ticket.version, &SubmissionId::new()),
                ticket,
                metadata,
            }),
            ..Default::default()
        }
    }

    fn titled(title: &str) -> Option<TicketMetadata> {
        Some(TicketMetadata {
            title: title.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_projection_keeps_metadata() {
        let store = InMemoryIndexStore::new();
        store
            .apply_projection(projection(
                ledger_ticket(1, TicketStatus::Open, 2),
                titled("Credential stuffing"),
            ))
            .await
            .unwrap();
        store
            .apply_projection(projection(ledger_ticket(1, TicketStatus::Claimed, 3), None))
            .await
            .unwrap();

        let snapshot = store.get_ticket(1).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Claimed);
        assert_eq!(snapshot.metadata.title, "Credential stuffing");
    }

    #[tokio::test]
    async fn test_older_version_discarded() {
        let store = InMemoryIndexStore::new();
        store
            .apply_projection(projection(ledger_ticket(1, TicketStatus::Submitted, 5), None))
            .await
            .unwrap();

        let outcome = store
            .apply_projection(projection(ledger_ticket(1, TicketStatus::Claimed, 4), None))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Stale { stored_version: 5 });
        let snapshot = store.get_ticket(1).await.unwrap().unwrap();
        assert_eq!(snapshot.status(), TicketStatus::Submitted);
    }

    #[tokio::test]
    async fn test_equal_version_overwrites() {
        let store = InMemoryIndexStore::new();
        store
            .apply_projection(projection(ledger_ticket(1, TicketStatus::Open, 2), titled("a")))
            .await
            .unwrap();
        let outcome = store
            .apply_projection(projection(ledger_ticket(1, TicketStatus::Open, 2), titled("b")))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(store.get_ticket(1).await.unwrap().unwrap().metadata.title, "b");
    }

    #[tokio::test]
    async fn test_query_by_role_newest_first() {
        let store = InMemoryIndexStore::new();
        for (id, status) in [
            (1, TicketStatus::Open),
            (2, TicketStatus::Claimed),
            (3, TicketStatus::Approved),
        ] {
            store
                .apply_projection(projection(ledger_ticket(id, status, id), None))
                .await
                .unwrap();
        }

        let by_client = store
            .query_tickets_by_role(client(), Role::Client)
            .await
            .unwrap();
        assert_eq!(
            by_client.iter().map(|t| t.ticket_id()).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );

        let by_analyst = store
            .query_tickets_by_role(analyst(), Role::Analyst)
            .await
            .unwrap();
        assert_eq!(by_analyst.len(), 2);

        let by_certifier = store
            .query_tickets_by_role(Address::derive("certifier"), Role::Certifier)
            .await
            .unwrap();
        assert_eq!(by_certifier.len(), 1);

        let open = store.tickets_by_status(TicketStatus::Open).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(store.list_tickets().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_token_owner_index_and_balances() {
        let store = InMemoryIndexStore::new();
        let stake = StakeToken {
            token_id: 1,
            owner: client(),
            amount: 500,
            is_used: true,
            locked_for: Some(1),
            settlement: None,
            version: 2,
        };
        store
            .apply_projection(Projection {
                stake_tokens: vec![stake.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.balances(client()).await.unwrap().stake_locked, 500);

        // Settlement arrives with a newer version, reward with it
        let settled = StakeToken {
            settlement: Some(StakeSettlement::Converted),
            version: 5,
            ..stake.clone()
        };
        let reward = RewardToken {
            token_id: 2,
            owner: analyst(),
            amount: 500,
            ticket_id: 1,
            kind: RewardKind::Analysis,
            version: 5,
        };
        store
            .apply_projection(Projection {
                stake_tokens: vec![settled],
                rewards: vec![reward.clone()],
                ..Default::default()
            })
            .await
            .unwrap();

        // A late, older stake write does not roll back the settlement
        store
            .apply_projection(Projection {
                stake_tokens: vec![stake],
                ..Default::default()
            })
            .await
            .unwrap();

        let client_balances = store.balances(client()).await.unwrap();
        assert_eq!(client_balances.stake_locked, 0);
        assert_eq!(client_balances.stake_converted, 500);
        assert_eq!(
            store.reward_tokens_by_owner(analyst()).await.unwrap(),
            vec![reward]
        );
        assert_eq!(store.balances(analyst()).await.unwrap().rewards, 500);
        assert_eq!(store.stake_tokens_by_owner(client()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_assigned_at_first_contact() {
        let store = InMemoryIndexStore::new();
        let first = store.register_user(analyst(), Role::Analyst).await.unwrap();
        let second = store.register_user(analyst(), Role::Client).await.unwrap();

        assert_eq!(first.role, Role::Analyst);
        assert_eq!(second, first);
        assert_eq!(
            store.get_user(analyst()).await.unwrap().map(|u| u.role),
            Some(Role::Analyst)
        );
    }

    #[tokio::test]
    async fn test_pending_record_merge_and_clear() {
        let store = InMemoryIndexStore::new();
        let key = PendingKey::Ticket(1001);
        store
            .record_reconciliation_pending(
                PendingReconciliation::new(key, "write failed").with_metadata(titled("x")),
            )
            .await
            .unwrap();
        store
            .record_reconciliation_pending(
                PendingReconciliation::new(key, "write failed again")
                    .with_last_tx(TxId([7; 32])),
            )
            .await
            .unwrap();

        let pending = store.pending_reconciliations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_tx, Some(TxId([7; 32])));
        assert_eq!(pending[0].metadata, titled("x"));

        store.clear_reconciliation_pending(key).await.unwrap();
        assert!(store.pending_reconciliations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_clear_keeps_newer_divergence() {
        let store = InMemoryIndexStore::new();
        let key = PendingKey::Ticket(1001);
        store
            .record_reconciliation_pending(
                PendingReconciliation::new(key, "write failed").with_last_tx(TxId([1; 32])),
            )
            .await
            .unwrap();
        let read = store.pending_reconciliations().await.unwrap().remove(0);

        store
            .record_reconciliation_pending(
                PendingReconciliation::new(key, "write failed").with_last_tx(TxId([2; 32])),
            )
            .await
            .unwrap();
        assert!(!store.clear_reconciliation_pending_if(&read).await.unwrap());
        let pending = store.pending_reconciliations().await.unwrap();
        assert_eq!(pending[0].last_tx, Some(TxId([2; 32])));

        assert!(store.clear_reconciliation_pending_if(&pending[0]).await.unwrap());
        assert!(store.pending_reconciliations().await.unwrap().is_empty());
        assert!(!store.clear_reconciliation_pending_if(&read).await.unwrap());
    }
}
