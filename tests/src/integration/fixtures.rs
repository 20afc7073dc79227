//! Shared harness for the integration tests.

use std::sync::Arc;

use dsoc_01_ledger_client::{FaultyLedger, InMemoryLedger, LedgerClient, LedgerConfig};
use dsoc_02_index_store::{FlakyIndexStore, InMemoryIndexStore, IndexStore};
use dsoc_03_ticket_lifecycle::{
    Applied, EngineConfig, Intent, LifecycleEngine, LifecycleResult, TicketLifecycleApi,
};
use dsoc_04_reconciliation::{ReconciliationSweeper, SweepConfig};
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::{Address, Amount, Digest, TicketId, TicketMetadata, TokenId};

pub type Engine =
    LifecycleEngine<FaultyLedger<InMemoryLedger>, FlakyIndexStore<InMemoryIndexStore>>;
pub type Sweeper = ReconciliationSweeper<Engine>;

pub const FIRST_TICKET_ID: TicketId = 1001;

pub fn client() -> Address {
    Address::derive("client")
}

pub fn analyst(name: &str) -> Address {
    Address::derive(&format!("analyst-{name}"))
}

pub fn certifier() -> Address {
    Address::derive("certifier")
}

pub fn metadata(title: &str) -> TicketMetadata {
    TicketMetadata {
        title: title.to_string(),
        category: "intrusion".into(),
        ..Default::default()
    }
}

/// Engine and sweeper over a fault-injecting ledger and index.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub sweeper: Sweeper,
    pub bus: Arc<InMemoryEventBus>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::for_testing())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let ledger = InMemoryLedger::new(LedgerConfig {
            first_ticket_id: FIRST_TICKET_ID,
            validator_policy: config.validator_policy,
            certifiers: vec![certifier()],
        });
        let ledger = Arc::new(FaultyLedger::new(Arc::new(ledger)));
        let index = Arc::new(FlakyIndexStore::new(Arc::new(InMemoryIndexStore::new())));
        let bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        let engine = LifecycleEngine::new(config, ledger, index)
            .unwrap()
            .with_events(Arc::clone(&publisher));
        let engine = Arc::new(engine);
        let sweeper = ReconciliationSweeper::new(SweepConfig::for_testing(), Arc::clone(&engine))
            .with_events(publisher);

        Self {
            engine,
            sweeper,
            bus,
        }
    }

    /// Fault injection on the ledger side.
    pub fn faults(&self) -> &FaultyLedger<InMemoryLedger> {
        self.engine.ledger()
    }

    /// The ledger itself, bypassing injected faults.
    pub fn ledger(&self) -> &InMemoryLedger {
        self.engine.ledger().inner()
    }

    /// The index, with failure injection.
    pub fn index(&self) -> &FlakyIndexStore<InMemoryIndexStore> {
        self.engine.index()
    }

    pub async fn stake(&self, owner: Address, amount: Amount) -> TokenId {
        self.engine
            .apply(Intent::Stake { owner, amount })
            .await
            .unwrap()
            .stake_token
            .unwrap()
            .token_id
    }

    pub async fn create(&self, client: Address, stake_token: TokenId) -> LifecycleResult<Applied> {
        self.engine
            .apply(Intent::CreateTicket {
                client,
                stake_token,
                evidence_hash: Digest::of(b"evidence bundle"),
                metadata: metadata("Credential stuffing"),
            })
            .await
    }

    pub async fn open_ticket(&self, amount: Amount) -> TicketId {
        let token = self.stake(client(), amount).await;
        self.create(client(), token)
            .await
            .unwrap()
            .ticket_id()
            .unwrap()
    }

    pub async fn claim(&self, analyst: Address, ticket_id: TicketId) -> LifecycleResult<Applied> {
        self.engine.apply(Intent::Claim { analyst, ticket_id }).await
    }

    pub async fn submit(&self, analyst: Address, ticket_id: TicketId) -> LifecycleResult<Applied> {
        self.engine
            .apply(Intent::SubmitReport {
                analyst,
                ticket_id,
                report_hash: Digest::of(b"incident report"),
            })
            .await
    }

    pub async fn validate(
        &self,
        validator: Address,
        ticket_id: TicketId,
        approved: bool,
    ) -> LifecycleResult<Applied> {
        self.engine
            .apply(Intent::Validate {
                validator,
                ticket_id,
                approved,
            })
            .await
    }

    /// Open a ticket, have `analyst` claim it and submit a report.
    pub async fn submitted_ticket(&self, analyst: Address, amount: Amount) -> TicketId {
        let ticket_id = self.open_ticket(amount).await;
        self.claim(analyst, ticket_id).await.unwrap();
        self.submit(analyst, ticket_id).await.unwrap();
        ticket_id
    }

    /// Every indexed ticket is at or behind its ledger counterpart.
    pub async fn assert_ledger_ahead(&self) {
        for ticket_id in self.ledger().ticket_ids() {
            let on_ledger = self.ledger().get_ticket(ticket_id).await.unwrap().unwrap();
            let Some(indexed) = self.index().inner().get_ticket(ticket_id).await.unwrap() else {
                continue;
            };
            assert!(
                indexed.version() <= on_ledger.version,
                "ticket {ticket_id}: index v{} ahead of ledger v{}",
                indexed.version(),
                on_ledger.version
            );
            assert!(indexed.status().rank() <= on_ledger.status.rank());
        }
    }

    /// Every indexed ticket equals its ledger counterpart.
    pub async fn assert_converged(&self) {
        for ticket_id in self.ledger().ticket_ids() {
            let on_ledger = self.ledger().get_ticket(ticket_id).await.unwrap().unwrap();
            let indexed = self
                .index()
                .inner()
                .get_ticket(ticket_id)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("ticket {ticket_id} missing from index"));
            assert_eq!(indexed.ticket, on_ledger);
        }
    }
}
