//! Projection writes and pending-reconciliation entries.

use serde::{Deserialize, Serialize};
use shared_types::{
    LedgerTicket, RewardToken, StakeToken, SubmissionId, TicketId, TicketMetadata,
    TicketSnapshot, Timestamp, TxId,
};
use std::fmt;

/// Ticket part of a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketProjection {
    pub ticket: LedgerTicket,
    pub last_tx: TxId,
    /// Replaces the stored metadata when present; kept otherwise.
    pub metadata: Option<TicketMetadata>,
}

impl TicketProjection {
    /// Build the snapshot to store, keeping metadata and creation time of
    /// the `existing` record when the projection does not replace them.
    pub fn into_snapshot(self, existing: Option<&TicketSnapshot>, now: Timestamp) -> TicketSnapshot {
        let metadata = match (self.metadata, existing) {
            (Some(metadata), _) => metadata,
            (None, Some(existing)) => existing.metadata.clone(),
            (None, None) => TicketMetadata::default(),
        };
        TicketSnapshot {
            ticket: self.ticket,
            metadata,
            last_tx: self.last_tx,
            created_at: existing.map_or(now, |e| e.created_at),
            updated_at: now,
        }
    }
}

/// Ledger state to mirror into the index after a committed transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub ticket: Option<TicketProjection>,
    pub stake_tokens: Vec<StakeToken>,
    pub rewards: Vec<RewardToken>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.ticket.is_none() && self.stake_tokens.is_empty() && self.rewards.is_empty()
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The incoming version was at least the stored one and was written.
    Applied,
    /// A newer version is already stored; the write was discarded.
    Stale { stored_version: u64 },
}

/// Compare-and-set rule shared by every backend: a write applies when its
/// version is not older than the stored one. Equal versions apply, so a
/// reconciliation overwrite of the same transition always lands.
pub fn version_admits(stored: Option<u64>, incoming: u64) -> bool {
    stored.map_or(true, |stored| incoming >= stored)
}

/// Key of a pending-reconciliation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PendingKey {
    /// Divergence on a known ticket.
    Ticket(TicketId),
    /// Submission whose outcome (and ticket id, for creations) is unknown.
    Submission(SubmissionId),
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKey::Ticket(id) => write!(f, "ticket:{id}"),
            PendingKey::Submission(id) => write!(f, "submission:{id}"),
        }
    }
}

/// A recorded divergence between ledger and index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReconciliation {
    pub key: PendingKey,
    /// Last ledger transition known to the recorder.
    pub last_tx: Option<TxId>,
    /// Submission behind the divergence, when known.
    pub submission_id: Option<SubmissionId>,
    /// Metadata the index could not store yet.
    pub metadata: Option<TicketMetadata>,
    pub reason: String,
    /// Sweep attempts so far.
    pub attempts: u32,
    pub recorded_at: Timestamp,
}

impl PendingReconciliation {
    pub fn new(key: PendingKey, reason: impl Into<String>) -> Self {
        Self {
            key,
            last_tx: None,
            submission_id: None,
            metadata: None,
            reason: reason.into(),
            attempts: 0,
            recorded_at: 0,
        }
    }

    pub fn with_last_tx(mut self, tx_id: TxId) -> Self {
        self.last_tx = Some(tx_id);
        self
    }

    pub fn with_submission(mut self, submission_id: SubmissionId) -> Self {
        self.submission_id = Some(submission_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Option<TicketMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same divergence as `other`: no newer transition or submission has been
    /// folded into either record since they were read.
    pub fn same_divergence(&self, other: &PendingReconciliation) -> bool {
        self.key == other.key
            && self.last_tx == other.last_tx
            && self.submission_id == other.submission_id
    }

    /// Fold a newer record for the same key into this one. Fields the newer
    /// record leaves empty keep their previous value.
    pub fn merge(&mut self, newer: PendingReconciliation) {
        self.last_tx = newer.last_tx.or(self.last_tx);
        self.submission_id = newer.submission_id.or(self.submission_id);
        if newer.metadata.is_some() {
            self.metadata = newer.metadata;
        }
        self.reason = newer.reason;
        self.attempts = self.attempts.max(newer.attempts);
    }
}
