//! # dsoc-01-ledger-client
//!
//! Gateway to the authoritative ticket ledger.
//!
//! ## Overview
//!
//! The ledger is the sole writer of ticket and token state. This crate:
//! - defines the `LedgerClient` port used by the lifecycle engine
//! - decodes raw on-ledger records at the boundary (unknown status codes fail)
//! - ships an in-memory contract simulator and a fault-injection wrapper
//!
//! ## Write Contract
//!
//! | Call | Commits | Rejects with |
//! |------|---------|--------------|
//! | `create_stake` | new unused `StakeToken` | `ZeroAmount` |
//! | `create_ticket` | `Open` ticket, stake marked used | `DoubleSpend`, `NotStakeOwner`, `StakeNotFound` |
//! | `claim` | `Claimed`, analyst = sender | `AlreadyClaimed`, `WrongStatus`, `SelfDealing` |
//! | `submit_report` | `Submitted`, report hash set | `NotAssignedAnalyst`, `WrongStatus` |
//! | `validate` | `Approved` + minted plan, or `Rejected` + refund | `NotValidator`, `DistributionMismatch` |
//!
//! ## Submission Ids
//!
//! Every write carries a `SubmissionId`. A committed submission is recorded
//! with its receipt; `lookup_submission` tells a caller whether a write that
//! timed out actually landed, and replaying the same id returns the original
//! receipt instead of applying the transition twice.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;

pub use adapters::{FaultyLedger, InMemoryLedger, LedgerConfig, LedgerFault};
pub use domain::{
    LedgerEvent, RawTicketRecord, RewardPlan, RewardShare, TicketTokens, TxContext, TxKind,
    TxReceipt,
};
pub use error::{LedgerError, LedgerResult, RejectReason};
pub use ports::outbound::{LedgerClient, TxResult};
