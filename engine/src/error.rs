//! Error types for the tracesync engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding or validating engine inputs.
///
/// The diff engine itself is total and never produces these; they only come
/// from parsing snapshots, feature names and FFI payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("snapshot format version mismatch: expected {expected}, got {actual}")]
    SnapshotVersionMismatch { expected: u32, actual: u32 },

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by the remote configuration store.
///
/// Carried as data inside [`ConfigurationState::Error`](crate::ConfigurationState::Error),
/// hence `Clone` and `PartialEq`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RemoteError {
    /// The store has never been written.
    #[error("configuration not found on remote")]
    NotFound,

    /// Connectivity or server fault.
    #[error("remote error: {0}")]
    Remote(String),
}

impl RemoteError {
    /// Create a [`RemoteError::Remote`] from anything printable.
    pub fn remote(message: impl Into<String>) -> Self {
        RemoteError::Remote(message.into())
    }

    /// Whether this failure is the recoverable "never written" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }
}
