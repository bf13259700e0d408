//! Remote configuration store seam.
//!
//! The synchronizer only needs two calls from the backend of record: read
//! the active configuration and replace it. How those calls reach the
//! backend is up to the implementation.
//!
//! ## Implementations
//!
//! - [`MemoryRemote`]: in-process store with call log and failure injection
//! - [`FileRemote`]: JSON snapshot file on disk

mod file;
mod memory;

pub use file::FileRemote;
pub use memory::{MemoryRemote, RemoteCall};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracesync_engine::{Configuration, RemoteError};

/// Access to the remote configuration store.
#[async_trait]
pub trait RemoteConfigClient: Debug + Send + Sync {
    /// Read the active configuration.
    ///
    /// Returns `RemoteError::NotFound` if the store has never been written.
    async fn fetch(&self) -> Result<Configuration, RemoteError>;

    /// Replace the active configuration.
    async fn push(&self, configuration: &Configuration) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteConfigClient + ?Sized> RemoteConfigClient for Arc<T> {
    async fn fetch(&self) -> Result<Configuration, RemoteError> {
        (**self).fetch().await
    }

    async fn push(&self, configuration: &Configuration) -> Result<(), RemoteError> {
        (**self).push(configuration).await
    }
}
