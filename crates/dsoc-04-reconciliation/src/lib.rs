//! # dsoc-04-reconciliation
//!
//! Drives the index back into agreement with the ledger.
//!
//! ## Overview
//!
//! The lifecycle engine queues a pending entry whenever it cannot tell
//! whether the index matches the ledger: a projection that failed after
//! backoff, or a submission whose outcome is unknown. The sweeper walks those
//! entries and repairs them from ledger state.
//!
//! ```text
//! ┌──────────────┐  pending_reconciliations  ┌───────────────────┐
//! │   Sweeper    │ ────────────────────────→ │  Lifecycle engine │
//! │ (interval)   │ ←──────────────────────── │  (dsoc-03)        │
//! └──────────────┘   Repaired / StillPending └───────────────────┘
//!        │                                        │         │
//!        │ breaker                           ledger read  index write
//!        ↓                                        ↓         ↓
//!  Running / Degraded / Halted               (dsoc-01)  (dsoc-02)
//! ```
//!
//! ## Per-Entry Outcome
//!
//! | Entry | Ledger says | Result |
//! |-------|-------------|--------|
//! | `Ticket(id)` | ticket exists | index overwritten, entry cleared |
//! | `Ticket(id)` | read fails | entry kept, attempts + 1 |
//! | `Submission(s)` | landed | projected, entry cleared |
//! | `Submission(s)` | not found | entry kept, attempts + 1 |
//! | any | attempts ≥ `abandon_after_attempts` | entry dropped |
//!
//! Sweeps may run concurrently with foreground operations. The index only
//! accepts projections whose version is not behind the stored one, so a
//! sweep never rolls back a newer write.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{CircuitBreaker, SweepEvent, SweepReport, SweepState};
pub use error::{SweepError, SweepResult};
pub use ports::inbound::SweepApi;
pub use service::{ReconciliationSweeper, SweepConfig};
