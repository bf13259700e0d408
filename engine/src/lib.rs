//! # Tracesync Engine
//!
//! A deterministic engine for editing a tracing configuration locally and
//! reconciling it with a remote store.
//!
//! This crate holds the pure part of the system: the configuration model,
//! the diff/merge set algebra that applies feature edits, and the state
//! machine that decides when local edits diverge from the remote copy.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches files, network or clocks
//! - **Deterministic**: same inputs always produce the same outputs
//! - **Value semantics**: every edit returns a new [`Configuration`]
//!
//! ## Core Concepts
//!
//! ### Configuration
//!
//! A [`Configuration`] holds one slot per instrumentation feature. Optional
//! slots distinguish "never configured" (`None`) from "explicitly off"
//! (`Some(empty)`).
//!
//! ### Actions
//!
//! Edits are expressed as actions, not direct mutations:
//! - [`ChangeFeature`] - enable or disable a [`Feature`] for some PIDs
//! - [`ConfigurationAction::Synchronize`] - push local edits
//! - [`ConfigurationAction::Reset`] - clear the remote configuration
//! - [`ConfigurationAction::Retry`] - recover from an error
//!
//! ### State machine
//!
//! [`transition`] maps a [`ConfigurationState`] and an action to the next
//! state plus an optional remote [`Effect`]; [`settle`] turns the effect's
//! outcome into the resulting state.
//!
//! ## Quick Start
//!
//! ```rust
//! use tracesync_engine::{
//!     transition, ChangeFeature, Configuration, ConfigurationAction, ConfigurationState,
//!     Effect, Feature,
//! };
//!
//! let state = ConfigurationState::Synchronized {
//!     configuration: Configuration::empty(),
//! };
//!
//! // Local edits never reach the remote store on their own.
//! let edit = transition(&state, ChangeFeature::enable(Feature::Gc, [42]).into());
//! assert!(edit.effect.is_none());
//! let diverged = edit.next.unwrap();
//! assert!(diverged.has_pending_changes());
//!
//! // Submitting asks the caller to push the local configuration.
//! let submit = transition(&diverged, ConfigurationAction::Synchronize);
//! assert!(matches!(submit.effect, Some(Effect::PushThenFetch(_))));
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for use from other
//! languages. All data is exchanged as JSON strings.
//!
//! ## Persistence
//!
//! [`ConfigurationSnapshot`] wraps a configuration with a format version for
//! storage backends.

pub mod configuration;
pub mod diff;
pub mod error;
pub mod feature;
pub mod ffi;
pub mod options;
pub mod snapshot;
pub mod state;

// Re-export main types at crate root
pub use configuration::{
    Configuration, PidMap, PidSet, UprobeSet, UprobeSpec, DEFAULT_DURATION_THRESHOLD,
};
pub use diff::{apply_change, apply_changes, update_pid_map, update_pid_set, update_uprobes};
pub use error::{Error, RemoteError, Result};
pub use feature::{ChangeFeature, ConfigurationAction, Feature, FeatureTag, PidDelta};
pub use options::{feature_options, FeatureOption};
pub use snapshot::{ConfigurationSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use state::{settle, transition, ConfigurationState, Effect, Transition};

/// Type aliases for clarity
pub type Pid = u32;
/// Nanoseconds
pub type DurationThreshold = u64;
