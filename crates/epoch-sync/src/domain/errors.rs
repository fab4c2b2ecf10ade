//! # Domain Errors
//!
//! Error types for the epoch synchronizer.
//!
//! Fetch and storage variants are transient from the worker's point of view:
//! the epoch attempt is abandoned and retried from scratch after the backoff.
//! The remaining variants cannot succeed on retry and stop the worker.

use thiserror::Error;

/// Root type alias (32-byte block/state root)
pub type Root = [u8; 32];

/// Result alias for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Epoch synchronizer error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The chain node returned no duty assignments for the epoch.
    #[error("No duty assignments for epoch {epoch}")]
    MissingAssignments {
        /// Epoch being synchronized
        epoch: u64,
    },

    /// Fetching duty assignments failed.
    #[error("Error fetching epoch {epoch} duties: {reason}")]
    AssignmentsFetch {
        /// Epoch being synchronized
        epoch: u64,
        /// Underlying failure
        reason: String,
    },

    /// Fetching a block header failed.
    #[error("Error fetching slot {slot} header: {reason}")]
    HeaderFetch {
        /// Slot whose header was requested
        slot: u64,
        /// Underlying failure
        reason: String,
    },

    /// Fetching a block body failed.
    #[error("Error fetching slot {slot} block: {reason}")]
    BodyFetch {
        /// Slot whose body was requested
        slot: u64,
        /// Underlying failure
        reason: String,
    },

    /// Validator statistics for the dependent state are unavailable.
    #[error("Error fetching validator stats for epoch {epoch}")]
    MissingValidatorStats {
        /// Epoch being synchronized
        epoch: u64,
    },

    /// Network error while talking to the chain node.
    #[error("Network error: {0}")]
    Network(String),

    /// Storage error (transaction open, write or commit).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record encoding/decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The epoch's slots (with lookahead) do not fit in a slot number.
    #[error("Epoch {epoch} is out of range")]
    EpochOutOfRange {
        /// Epoch being synchronized
        epoch: u64,
    },

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Whether the worker should retry the epoch after the backoff.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::InvalidConfig(_) | SyncError::EpochOutOfRange { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for SyncError {
    fn from(err: bincode::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}
