//! Error types for the Index Store

use thiserror::Error;

/// Index Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The store cannot be reached
    #[error("Index unavailable: {reason}")]
    Unavailable { reason: String },

    /// Backend read or write failed
    #[error("Index storage error: {reason}")]
    Storage { reason: String },

    /// A stored value failed to encode or decode
    #[error("Index codec error: {reason}")]
    Codec { reason: String },
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Codec {
            reason: err.to_string(),
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
