//! # Error Types
//!
//! Decoding failures for values that cross a trust boundary as raw data.

use thiserror::Error;

/// Errors raised while decoding raw identifiers, codes or labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Status code outside the closed `TicketStatus` set.
    #[error("Unknown ticket status code: {0}")]
    UnknownStatus(u8),

    /// Role label that is not one of client/analyst/certifier.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Severity label outside low/medium/high/critical.
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    /// Validator policy label outside certifier/client.
    #[error("Unknown validator policy: {0}")]
    UnknownPolicy(String),

    /// Hex string that does not decode to exactly 32 bytes.
    #[error("Invalid 32-byte hex value: {0}")]
    InvalidHex(String),
}
