//! Ports for the Ticket Lifecycle Engine

pub mod inbound;
