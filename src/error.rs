//! Error types for enumstore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for enumerator operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    /// Terminal for the store instance that raised it
    #[error("enumerator storage corrupted: {}: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Contract Errors
    // -------------------------------------------------------------------------
    #[error("Id {0} was never assigned by this enumerator")]
    InvalidId(u32),

    #[error("Enumerator is closed")]
    Closed,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for faults that leave the store unusable
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }

    /// Faults that, raised mid-lookup or mid-insert, leave the directory untrustworthy
    pub(crate) fn is_structural(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_) | StoreError::Serialization(_) | StoreError::Corrupted { .. }
        )
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
