//! Unified error handling for the synchronizer.

use crate::config::ConfigError;

/// Synchronizer error type.
#[derive(Debug, thiserror::Error)]
pub enum SynchronizerError {
    /// The actor has stopped and no longer accepts actions.
    #[error("synchronizer is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] tracesync_engine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, SynchronizerError>;
