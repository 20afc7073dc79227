//! Ports for Reconciliation

pub mod inbound;
