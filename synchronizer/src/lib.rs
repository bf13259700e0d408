//! Tracesync Synchronizer - keeps a locally edited tracing configuration in
//! step with the remote store of record.
//!
//! The pure decisions live in `tracesync_engine`; this crate runs them. A
//! [`Synchronizer`] task owns a [`RemoteConfigClient`], executes the effects
//! requested by the state machine one at a time, and publishes every state
//! through a [`SynchronizerHandle`].
//!
//! ```no_run
//! use tracesync_engine::{ChangeFeature, ConfigurationAction, Feature};
//! use tracesync_synchronizer::{MemoryRemote, Synchronizer, SynchronizerConfig};
//!
//! # async fn demo() -> tracesync_synchronizer::Result<()> {
//! let handle = Synchronizer::spawn(MemoryRemote::new(), SynchronizerConfig::default());
//! handle.dispatch(ChangeFeature::enable(Feature::Gc, [1234]))?;
//! handle.dispatch(ConfigurationAction::Synchronize)?;
//! let state = handle.wait_for_settled().await?;
//! assert!(state.is_synchronized());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod synchronizer;

pub use config::{ConfigError, SynchronizerConfig};
pub use error::{Result, SynchronizerError};
pub use remote::{FileRemote, MemoryRemote, RemoteCall, RemoteConfigClient};
pub use synchronizer::{Synchronizer, SynchronizerHandle};
