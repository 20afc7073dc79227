//! # dsoc-02-index-store
//!
//! Queryable projection of ledger state.
//!
//! ## Overview
//!
//! The index answers every read the ledger is too slow or too narrow for:
//! tickets by role or status, token history per owner, balances, user roles
//! and ticket metadata. It is never authoritative. Every record it holds can
//! be rebuilt from the ledger, except free-text metadata.
//!
//! ## Version Rule
//!
//! Ticket and stake records carry the ledger sequence of the transition that
//! produced them. A write is conditional on that version:
//!
//! | Stored | Incoming | Result |
//! |--------|----------|--------|
//! | none | v | `Applied` |
//! | v | v | `Applied` (same transition, overwrite) |
//! | v | v + n | `Applied` |
//! | v + n | v | `Stale`, write discarded |
//!
//! Reward tokens are append-only: a token id already present is never
//! rewritten. A late projection therefore cannot roll back a newer one.
//!
//! ## Pending Reconciliation
//!
//! When the engine cannot project a committed transition it records a
//! `PendingReconciliation` keyed by ticket (or by submission when the ticket
//! id is still unknown). Records for the same key are merged.
//!
//! ## Backends
//!
//! - `InMemoryIndexStore`: default, single `RwLock`
//! - `RocksDbIndexStore`: durable, behind the `rocksdb` feature
//! - `FlakyIndexStore`: failure injection for tests

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;

pub use adapters::{FlakyIndexStore, InMemoryIndexStore};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbIndexConfig, RocksDbIndexStore};
pub use domain::{
    version_admits, PendingKey, PendingReconciliation, Projection, TicketProjection, WriteOutcome,
};
pub use error::{IndexError, IndexResult};
pub use ports::outbound::IndexStore;
