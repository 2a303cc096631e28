//! Error types for the aggregation pipeline.
//!
//! Only `MissingShard` is recoverable: the coordinator logs it and skips
//! the participant. Every other variant ends the run.

use crate::models::ParticipantId;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, FedError>;

/// Errors that can occur during a federated aggregation run.
#[derive(Error, Debug)]
pub enum FedError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Participant {participant}: record {row} is missing field `{field}`")]
    MissingField {
        participant: ParticipantId,
        field: String,
        row: usize,
    },

    #[error("Number of selected clients ({selected}) exceeds the total number of clients ({total})")]
    ClientCount { selected: usize, total: usize },

    #[error("No participant out of {total} met the reliability ratio {min_ratio}")]
    EmptySelection { min_ratio: f64, total: usize },

    #[error("No persisted artifact for participant {participant}")]
    MissingShard { participant: ParticipantId },

    #[error("Storage error for participant {participant}: {source}")]
    Storage {
        participant: ParticipantId,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Participant task failed: {0}")]
    TaskFailed(String),
}

impl FedError {
    /// Shorthand for building an `InvalidParameter` error.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        FedError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the run may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FedError::MissingShard { .. })
    }
}

impl From<tokio::task::JoinError> for FedError {
    fn from(err: tokio::task::JoinError) -> Self {
        FedError::TaskFailed(err.to_string())
    }
}

impl From<serde_json::Error> for FedError {
    fn from(err: serde_json::Error) -> Self {
        FedError::Serialization(err.to_string())
    }
}
