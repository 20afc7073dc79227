//! Domain types for the Ledger Client

pub mod plan;
pub mod receipt;
pub mod record;

pub use plan::{RewardPlan, RewardShare};
pub use receipt::{LedgerEvent, TicketTokens, TxContext, TxKind, TxReceipt};
pub use record::RawTicketRecord;
