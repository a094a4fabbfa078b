//! Pattern store error types
//!
//! Defines all errors that can occur in the persistence layer, plus the
//! typed rejection returned when a cascade edge would violate a graph
//! invariant.

use crate::store::types::{CascadeId, PatternId};
use thiserror::Error;

/// Errors that can occur in the pattern store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Requested pattern does not exist
    #[error("Pattern not found: {0}")]
    PatternNotFound(PatternId),

    /// Requested cascade does not exist
    #[error("Cascade not found: {0}")]
    CascadeNotFound(CascadeId),

    /// A record with this id already exists
    #[error("Record already exists: {0}")]
    Conflict(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Why a proposed cascade edge was not created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CascadeRejection {
    /// Both endpoints are the same observation
    #[error("Cascade from pattern {0} to itself")]
    SelfLoop(PatternId),

    /// An edge for this ordered pair already exists on the same calendar day
    #[error("Cascade {from} -> {to} already recorded today as {existing}")]
    DuplicateSameDay {
        from: PatternId,
        to: PatternId,
        existing: CascadeId,
    },

    /// An endpoint is not in the store
    #[error("Cascade endpoint {0} does not exist")]
    MissingEndpoint(PatternId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = PatternId::new();
        let err = StoreError::PatternNotFound(id);
        assert_eq!(err.to_string(), format!("Pattern not found: {}", id));

        let err = CascadeRejection::SelfLoop(id);
        assert_eq!(err.to_string(), format!("Cascade from pattern {} to itself", id));
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
