//! Domain types for the Index Store

pub mod projection;

pub use projection::{
    version_admits, PendingKey, PendingReconciliation, Projection, TicketProjection, WriteOutcome,
};
