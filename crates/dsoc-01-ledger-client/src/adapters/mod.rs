//! Adapters for the Ledger Client
//!
//! - `InMemoryLedger`: simulation of the ticket contract
//! - `FaultyLedger`: wrapper injecting unreachable/timeout/delay faults

pub mod faulty;
pub mod in_memory;

pub use faulty::{FaultyLedger, LedgerFault};
pub use in_memory::{InMemoryLedger, LedgerConfig};
