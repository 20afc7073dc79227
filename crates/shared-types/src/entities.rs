//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `Digest`, `TxId`, `SubmissionId`
//! - **Tickets**: `LedgerTicket`, `TicketMetadata`, `TicketSnapshot`
//! - **Value**: `StakeToken`, `RewardToken`, `Balances`
//! - **Participants**: `UserRecord`

use crate::errors::DecodeError;
use crate::status::{Role, Severity, TicketStatus};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ledger-assigned ticket identifier.
pub type TicketId = u64;

/// Ledger-assigned token identifier, shared by stake and reward tokens.
pub type TokenId = u64;

/// Token amount in base units.
pub type Amount = u64;

// =============================================================================
// IDENTITY
// =============================================================================

fn decode_32(s: &str) -> Result<[u8; 32], DecodeError> {
    let trimmed = s.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed).map_err(|_| DecodeError::InvalidHex(s.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| DecodeError::InvalidHex(s.to_string()))
}

/// A 32-byte participant address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive a stable address from a label (test fixtures, config seeds).
    pub fn derive(label: &str) -> Self {
        Self(Sha256::digest(label.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

/// Content-addressed SHA-256 digest (evidence and reports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Digest of the given content.
    pub fn of(content: &[u8]) -> Self {
        Self(Sha256::digest(content).into())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

/// Unique identifier of a committed ledger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    /// Transition id for ledger sequence `sequence` of `submission`.
    pub fn derive(sequence: u64, submission: &SubmissionId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sequence.to_be_bytes());
        hasher.update(submission.0.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

/// Client-chosen identifier attached to every ledger submission.
///
/// The ledger records it with the committed transition, which makes an
/// unacknowledged submission discoverable before it is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TICKETS
// =============================================================================

/// Authoritative ticket fields as committed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTicket {
    pub ticket_id: TicketId,
    pub client: Address,
    /// Unset while `Open`.
    pub analyst: Option<Address>,
    /// Immutable once set.
    pub evidence_hash: Digest,
    /// Unset until `Submitted`.
    pub report_hash: Option<Digest>,
    pub status: TicketStatus,
    /// Fixed at creation.
    pub stake_amount: Amount,
    /// Stake token consumed by the creation.
    pub stake_token: TokenId,
    /// Actor that approved or rejected the report.
    pub validated_by: Option<Address>,
    /// Ledger sequence of the last transition touching this ticket.
    pub version: u64,
}

impl LedgerTicket {
    /// Checks the field/status invariants of a ticket record.
    pub fn is_well_formed(&self) -> bool {
        let analyst_ok = match self.status {
            TicketStatus::Open => self.analyst.is_none(),
            _ => self.analyst.is_some(),
        };
        let report_ok = (self.status.rank() >= TicketStatus::Submitted.rank())
            == self.report_hash.is_some();
        let validated_ok = self.status.is_terminal() == self.validated_by.is_some();

        analyst_ok && report_ok && validated_ok && self.stake_amount > 0
    }
}

/// Free-text ticket metadata, held only by the index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketMetadata {
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: Severity,
}

/// Index projection of a ticket: ledger fields plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub ticket: LedgerTicket,
    pub metadata: TicketMetadata,
    /// Ledger transition the projection was built from.
    pub last_tx: TxId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TicketSnapshot {
    pub fn ticket_id(&self) -> TicketId {
        self.ticket.ticket_id
    }

    pub fn status(&self) -> TicketStatus {
        self.ticket.status
    }

    pub fn version(&self) -> u64 {
        self.ticket.version
    }

    /// Whether `address` participates in this ticket under `role`.
    pub fn involves(&self, address: &Address, role: Role) -> bool {
        match role {
            Role::Client => self.ticket.client == *address,
            Role::Analyst => self.ticket.analyst.as_ref() == Some(address),
            Role::Certifier => self.ticket.validated_by.as_ref() == Some(address),
        }
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// How a consumed stake was resolved once its ticket reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeSettlement {
    /// Ticket rejected: value returned to the owner.
    Refunded,
    /// Ticket approved: value converted into reward tokens.
    Converted,
}

/// A value deposit that backs exactly one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeToken {
    pub token_id: TokenId,
    pub owner: Address,
    pub amount: Amount,
    /// Set once, when a ticket creation consumes the token.
    pub is_used: bool,
    pub locked_for: Option<TicketId>,
    pub settlement: Option<StakeSettlement>,
    /// Ledger sequence of the last change to this token.
    pub version: u64,
}

/// Reason a reward token was minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardKind {
    Analysis,
    Certification,
    Platform,
}

/// Reward credit (CLT) minted on approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardToken {
    pub token_id: TokenId,
    pub owner: Address,
    pub amount: Amount,
    /// Ticket whose approval minted this token.
    pub ticket_id: TicketId,
    pub kind: RewardKind,
    pub version: u64,
}

/// Balances derived from a user's token history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    /// Unused stake deposits.
    pub stake_available: Amount,
    /// Stake consumed by tickets that are not yet settled.
    pub stake_locked: Amount,
    /// Stake returned after a rejection.
    pub stake_refunded: Amount,
    /// Stake converted into rewards after an approval.
    pub stake_converted: Amount,
    /// Sum of owned reward tokens.
    pub rewards: Amount,
}

impl Balances {
    /// Recompute balances from token history.
    pub fn from_tokens<'a>(
        stakes: impl IntoIterator<Item = &'a StakeToken>,
        rewards: impl IntoIterator<Item = &'a RewardToken>,
    ) -> Self {
        let mut balances = Balances::default();
        for stake in stakes {
            let bucket = match (stake.is_used, stake.settlement) {
                (false, _) => &mut balances.stake_available,
                (true, None) => &mut balances.stake_locked,
                (true, Some(StakeSettlement::Refunded)) => &mut balances.stake_refunded,
                (true, Some(StakeSettlement::Converted)) => &mut balances.stake_converted,
            };
            *bucket = bucket.saturating_add(stake.amount);
        }
        balances.rewards = rewards
            .into_iter()
            .fold(0u64, |acc, token| acc.saturating_add(token.amount));
        balances
    }
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// Index record for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub address: Address,
    /// Assigned at first contact; never changed afterwards.
    pub role: Role,
    pub registered_at: Timestamp,
}
