//! # Shared Types Crate
//!
//! Identifiers, status enums and the ticket/token records exchanged between
//! the ledger client, the index store and the lifecycle engine.
//!
//! ## Design Principles
//!
//! - **Closed status set**: `TicketStatus` is a tagged enum. Raw on-ledger
//!   codes are decoded once, at the ledger boundary, and unknown codes fail.
//! - **Ledger records vs. projections**: `LedgerTicket` carries only
//!   authoritative fields. `TicketSnapshot` adds index-only metadata and the
//!   projection bookkeeping (`last_tx`, timestamps).
//! - **Derived balances**: `Balances` is always recomputed from token history,
//!   never stored as a counter.

pub mod entities;
pub mod errors;
pub mod status;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use status::*;
pub use time::{SystemTimeSource, TimeSource, Timestamp};
