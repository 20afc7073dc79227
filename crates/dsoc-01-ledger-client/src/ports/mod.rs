//! Ports for the Ledger Client

pub mod outbound;
