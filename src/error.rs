//! Error types for reputation operations.

use thiserror::Error;

use crate::reputation::ReputationKind;

/// A single score adjustment that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentFailure {
    pub kind: ReputationKind,
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for AdjustmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.key, self.message)
    }
}

/// Errors that can occur during reputation operations.
#[derive(Error, Debug)]
pub enum ReputationError {
    /// Policy configuration rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Backing store read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// One or both adjustments for a login outcome failed.
    #[error(
        "Outcome not recorded ({} failed): {}",
        .failures.len(),
        .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    OutcomeNotRecorded { failures: Vec<AdjustmentFailure> },

    /// No policy registered under this name.
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// A policy with this name is already registered.
    #[error("Policy already exists: {0}")]
    PolicyExists(String),
}

/// Result type for reputation operations.
pub type Result<T> = std::result::Result<T, ReputationError>;
