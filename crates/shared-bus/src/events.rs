//! # Lifecycle Events
//!
//! Events published after a ledger transition has been committed. They mirror
//! the events the ticket contract emits, plus projection/reconciliation
//! notices from the engine and the sweeper.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, Digest, TicketId, TokenId, TxId};

/// Component identifiers used as event sources.
pub mod source {
    /// Ticket lifecycle engine.
    pub const LIFECYCLE: u8 = 3;
    /// Reconciliation sweeper.
    pub const RECONCILIATION: u8 = 4;
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DsocEvent {
    // =========================================================================
    // STAKES
    // =========================================================================
    /// A stake deposit was committed.
    StakeCreated {
        token_id: TokenId,
        owner: Address,
        amount: Amount,
        tx_id: TxId,
    },

    // =========================================================================
    // TICKET TRANSITIONS
    // =========================================================================
    /// A ticket was opened, consuming a stake token.
    TicketCreated {
        ticket_id: TicketId,
        client: Address,
        stake_amount: Amount,
        tx_id: TxId,
    },

    /// An analyst won the claim on a ticket.
    AnalystAssigned {
        ticket_id: TicketId,
        analyst: Address,
        tx_id: TxId,
    },

    /// The assigned analyst submitted a report.
    ReportSubmitted {
        ticket_id: TicketId,
        analyst: Address,
        report_hash: Digest,
        tx_id: TxId,
    },

    /// The ticket reached a terminal state.
    TicketValidated {
        ticket_id: TicketId,
        approved: bool,
        validator: Address,
        /// Total reward minted (approved path).
        minted: Amount,
        /// Stake returned to the client (rejected path).
        refunded: Amount,
        tx_id: TxId,
    },

    // =========================================================================
    // PROJECTION / RECONCILIATION
    // =========================================================================
    /// The index could not be updated after a committed transition.
    ProjectionStale {
        /// Pending-reconciliation key, rendered.
        key: String,
        tx_id: Option<TxId>,
        attempts: u32,
    },

    /// The index entry of a ticket was overwritten from the ledger.
    Reconciled { ticket_id: TicketId, version: u64 },

    /// A reconciliation sweep finished.
    SweepCompleted {
        examined: usize,
        repaired: usize,
        still_pending: usize,
    },
}

impl DsocEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::StakeCreated { .. } => EventTopic::Stake,
            Self::TicketCreated { .. }
            | Self::AnalystAssigned { .. }
            | Self::ReportSubmitted { .. } => EventTopic::Ticket,
            Self::TicketValidated { .. } => EventTopic::Settlement,
            Self::ProjectionStale { .. }
            | Self::Reconciled { .. }
            | Self::SweepCompleted { .. } => EventTopic::Reconciliation,
        }
    }

    /// Get the originating component ID.
    #[must_use]
    pub fn source_component(&self) -> u8 {
        match self {
            Self::SweepCompleted { .. } => source::RECONCILIATION,
            _ => source::LIFECYCLE,
        }
    }

    /// Ticket this event concerns, if any.
    #[must_use]
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::AnalystAssigned { ticket_id, .. }
            | Self::ReportSubmitted { ticket_id, .. }
            | Self::TicketValidated { ticket_id, .. }
            | Self::Reconciled { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Stake deposits.
    Stake,
    /// Ticket creation, claim and report submission.
    Ticket,
    /// Approval/rejection and the value movements they trigger.
    Settlement,
    /// Stale projections and their repair.
    Reconciliation,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source components to include. Empty means all sources.
    pub sources: Vec<u8>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            sources: Vec::new(),
        }
    }

    /// Create a filter for events from specific components.
    #[must_use]
    pub fn from_sources(sources: Vec<u8>) -> Self {
        Self {
            topics: Vec::new(),
            sources,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &DsocEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match =
            self.sources.is_empty() || self.sources.contains(&event.source_component());

        topic_match && source_match
    }
}
