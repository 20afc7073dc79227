//! # dsoc-03-ticket-lifecycle
//!
//! Ticket state machine and the ledger/index write protocol.
//!
//! ## Overview
//!
//! Callers express intents ("analyst A claims ticket 1001"). The engine
//! checks them, commits them on the ledger, then projects the result into the
//! index. Reads are served by the index; writes always originate here.
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | No transition skipping | state machine precheck; ledger re-check |
//! | Single claim winner | ledger serializes writes per ticket; rejections never retried |
//! | Stake conservation | reward plan totals the stake on approval; refund on rejection |
//! | No double spend | ledger refuses a used stake token |
//! | Ledger ahead of index | index written only after the ledger commits |
//! | Convergence | failed projections queued; `reconcile` overwrites from the ledger |
//!
//! ## Failure Handling
//!
//! | Failure | Caller sees | Follow-up |
//! |---------|-------------|-----------|
//! | precheck fails | `InvalidTransition` | none |
//! | ledger rejects | `LedgerRejected` | none |
//! | ledger unreachable, lookup says not landed | retry with same submission id | none |
//! | no acknowledgement, outcome unknown | `LedgerTimeout { Unknown }` | pending entry |
//! | projection fails after backoff | `Applied { Stale }` | pending entry |
//!
//! ## Reward Distribution
//!
//! `SingleBeneficiary` pays the whole stake to the analyst. `WeightedSplit`
//! divides it between analyst, validator and platform in basis points.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{
    compute_delay, precheck, settlement_plan, DistributionKind, Intent, RetryConfig,
    RewardDistribution, SingleBeneficiary, WeightedSplit,
};
pub use error::{CommitState, LifecycleError, LifecycleResult};
pub use ports::inbound::{
    Applied, Freshness, PendingOutcome, SubmissionStatus, TicketLifecycleApi,
};
pub use service::{EngineConfig, LifecycleEngine};
