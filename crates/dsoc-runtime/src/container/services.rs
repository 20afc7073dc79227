//! # Service Container
//!
//! Holds the component instances and wires them together.
//!
//! ```text
//! InMemoryEventBus ←── publish ── LifecycleEngine ←── ReconciliationSweeper
//!                                   │        │
//!                             LedgerClient  IndexStore
//! ```
//!
//! The container is generic over the index backend so the in-memory and
//! RocksDB stores share one wiring path.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use dsoc_01_ledger_client::{InMemoryLedger, LedgerConfig};
use dsoc_02_index_store::IndexStore;
use dsoc_03_ticket_lifecycle::{LifecycleEngine, TicketLifecycleApi};
use dsoc_04_reconciliation::ReconciliationSweeper;
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::Role;

use crate::container::config::RuntimeConfig;

/// Engine over the runtime ledger and index backend `S`.
pub type RuntimeEngine<S> = LifecycleEngine<InMemoryLedger, S>;

/// Sweeper over [`RuntimeEngine`].
pub type RuntimeSweeper<S> = ReconciliationSweeper<RuntimeEngine<S>>;

/// Central container holding every component instance.
pub struct DsocContainer<S: IndexStore + 'static> {
    /// Runtime configuration.
    pub config: RuntimeConfig,
    /// Event bus for lifecycle and sweep events.
    pub event_bus: Arc<InMemoryEventBus>,
    /// Ledger client (dsoc-01).
    pub ledger: Arc<InMemoryLedger>,
    /// Index store (dsoc-02).
    pub index: Arc<S>,
    /// Lifecycle engine (dsoc-03).
    pub engine: Arc<RuntimeEngine<S>>,
    /// Reconciliation sweeper (dsoc-04).
    pub sweeper: Arc<RuntimeSweeper<S>>,
}

impl<S: IndexStore + 'static> DsocContainer<S> {
    /// Build every component and register the configured certifiers.
    pub async fn build(config: RuntimeConfig, index: Arc<S>) -> Result<Self> {
        let event_bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = event_bus.clone();

        let ledger = Arc::new(InMemoryLedger::new(LedgerConfig {
            first_ticket_id: config.ledger.first_ticket_id,
            validator_policy: config.engine.validator_policy,
            certifiers: config.certifiers.clone(),
        }));
        info!(
            first_ticket_id = config.ledger.first_ticket_id,
            policy = ?config.engine.validator_policy,
            "[dsoc-01] ledger ready"
        );

        let engine = LifecycleEngine::new(
            config.engine.clone(),
            Arc::clone(&ledger),
            Arc::clone(&index),
        )
        .context("Failed to create lifecycle engine")?
        .with_events(Arc::clone(&publisher));
        let engine = Arc::new(engine);
        info!(
            distribution = ?config.engine.distribution,
            ledger_timeout_ms = config.engine.ledger_timeout_ms,
            "[dsoc-03] lifecycle engine ready"
        );

        for certifier in &config.certifiers {
            engine
                .register_user(*certifier, Role::Certifier)
                .await
                .with_context(|| format!("Failed to register certifier {certifier}"))?;
        }

        let sweeper = Arc::new(
            ReconciliationSweeper::new(config.sweep.clone(), Arc::clone(&engine))
                .with_events(publisher),
        );
        info!(
            enabled = config.sweep.enabled,
            interval_ms = config.sweep.interval_ms,
            "[dsoc-04] reconciliation sweeper ready"
        );

        Ok(Self {
            config,
            event_bus,
            ledger,
            index,
            engine,
            sweeper,
        })
    }
}
