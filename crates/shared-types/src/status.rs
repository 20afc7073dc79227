//! # Ticket Status, Roles and Validation Policy
//!
//! ```text
//! [OPEN] ──claim──→ [CLAIMED] ──submit──→ [SUBMITTED] ──validate(true)──→ [APPROVED]
//!                                              │
//!                                              └──────validate(false)────→ [REJECTED]
//! ```
//!
//! Every non-initial state has exactly one predecessor. `Approved` and
//! `Rejected` are terminal.

use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a ticket.
///
/// The discriminants are the raw codes stored on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TicketStatus {
    /// Stake locked, waiting for an analyst.
    Open = 0,
    /// An analyst holds the ticket.
    Claimed = 1,
    /// Report submitted, waiting for validation.
    Submitted = 2,
    /// Report accepted; stake converted into rewards.
    Approved = 3,
    /// Report refused; stake refunded to the client.
    Rejected = 4,
}

impl TicketStatus {
    /// Raw ledger code.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Approved | TicketStatus::Rejected)
    }

    /// Position along the lifecycle chain. Both terminal states share a rank.
    pub fn rank(self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::Claimed => 1,
            TicketStatus::Submitted => 2,
            TicketStatus::Approved | TicketStatus::Rejected => 3,
        }
    }

    /// Whether `next` is the direct successor of `self`.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Open, TicketStatus::Claimed)
                | (TicketStatus::Claimed, TicketStatus::Submitted)
                | (TicketStatus::Submitted, TicketStatus::Approved)
                | (TicketStatus::Submitted, TicketStatus::Rejected)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Claimed => "claimed",
            TicketStatus::Submitted => "submitted",
            TicketStatus::Approved => "approved",
            TicketStatus::Rejected => "rejected",
        }
    }
}

impl TryFrom<u8> for TicketStatus {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TicketStatus::Open),
            1 => Ok(TicketStatus::Claimed),
            2 => Ok(TicketStatus::Submitted),
            3 => Ok(TicketStatus::Approved),
            4 => Ok(TicketStatus::Rejected),
            other => Err(DecodeError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant role, assigned at first contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Client,
    Analyst,
    Certifier,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Analyst => "analyst",
            Role::Certifier => "certifier",
        }
    }
}

impl FromStr for Role {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "analyst" => Ok(Role::Analyst),
            "certifier" => Ok(Role::Certifier),
            other => Err(DecodeError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may call `validate` on a submitted ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidatorPolicy {
    /// A registered certifier validates.
    #[default]
    Certifier,
    /// The client who opened the ticket validates.
    Client,
}

impl ValidatorPolicy {
    /// Role a validating actor must hold under this policy.
    pub fn required_role(self) -> Role {
        match self {
            ValidatorPolicy::Certifier => Role::Certifier,
            ValidatorPolicy::Client => Role::Client,
        }
    }
}

impl FromStr for ValidatorPolicy {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "certifier" => Ok(ValidatorPolicy::Certifier),
            "client" => Ok(ValidatorPolicy::Client),
            other => Err(DecodeError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Incident severity, index-only metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Severity {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(DecodeError::UnknownSeverity(other.to_string())),
        }
    }
}
