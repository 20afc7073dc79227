//! Ports for the Index Store

pub mod outbound;
