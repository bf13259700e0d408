//! Reconciliation state machine between the local editor and the remote store.
//!
//! # States
//!
//! ```text
//!                 Initialize ok                ChangeFeature
//! Uninitialized ───────────────▶ Synchronized ───────────────▶ Diverged
//!       │                          ▲    ▲                         │ │
//!       │ Initialize failed        │    └── collapse (local ==    │ │
//!       ▼                          │        backend) ◀────────────┘ │
//!     Error ◀── remote failure ────┴── Synchronize / Reset ◀────────┘
//! ```
//!
//! This module is pure. [`transition`] decides the next state and the remote
//! effect to run; the caller runs the effect and feeds its outcome to
//! [`settle`]. Keeping IO out of here means local edits never cause network
//! traffic and only a submit does.

use crate::diff::apply_change;
use crate::{Configuration, ConfigurationAction, RemoteError};
use serde::{Deserialize, Serialize};

/// Authoritative reconciliation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfigurationState {
    /// Nothing fetched yet
    Uninitialized,
    /// Local view equals the last known remote value
    Synchronized { configuration: Configuration },
    /// Local edits exist that have not been pushed
    #[serde(rename_all = "camelCase")]
    Diverged {
        local_configuration: Configuration,
        backend_configuration: Configuration,
    },
    /// The last remote operation failed
    Error { cause: RemoteError },
}

impl ConfigurationState {
    /// The configuration the user is editing, if any.
    pub fn local_configuration(&self) -> Option<&Configuration> {
        match self {
            ConfigurationState::Synchronized { configuration } => Some(configuration),
            ConfigurationState::Diverged {
                local_configuration,
                ..
            } => Some(local_configuration),
            _ => None,
        }
    }

    /// The last configuration confirmed by the remote store, if any.
    pub fn backend_configuration(&self) -> Option<&Configuration> {
        match self {
            ConfigurationState::Synchronized { configuration } => Some(configuration),
            ConfigurationState::Diverged {
                backend_configuration,
                ..
            } => Some(backend_configuration),
            _ => None,
        }
    }

    pub fn is_synchronized(&self) -> bool {
        matches!(self, ConfigurationState::Synchronized { .. })
    }

    /// Whether there are local edits waiting for a submit.
    pub fn has_pending_changes(&self) -> bool {
        matches!(self, ConfigurationState::Diverged { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConfigurationState::Error { .. })
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigurationState::Uninitialized => "uninitialized",
            ConfigurationState::Synchronized { .. } => "synchronized",
            ConfigurationState::Diverged { .. } => "diverged",
            ConfigurationState::Error { .. } => "error",
        }
    }
}

/// Remote work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch; on `NotFound` push the empty configuration and fetch once more.
    Initialize,
    /// Push the configuration, then fetch to learn what the remote accepted.
    ///
    /// The fetch stands in for a change notification from the remote side,
    /// which the store does not offer yet.
    PushThenFetch(Configuration),
}

/// Outcome of [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State to publish immediately, or `None` to keep the current one.
    pub next: Option<ConfigurationState>,
    /// Remote work to run before the state settles.
    pub effect: Option<Effect>,
}

impl Transition {
    /// The action has no meaning in the current state.
    pub fn ignored() -> Self {
        Self {
            next: None,
            effect: None,
        }
    }

    fn to(state: ConfigurationState) -> Self {
        Self {
            next: Some(state),
            effect: None,
        }
    }

    fn effect(effect: Effect) -> Self {
        Self {
            next: None,
            effect: Some(effect),
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.next.is_none() && self.effect.is_none()
    }
}

/// Decide what `action` does in `state`.
pub fn transition(state: &ConfigurationState, action: ConfigurationAction) -> Transition {
    use ConfigurationAction as A;
    use ConfigurationState as S;

    match (state, action) {
        (S::Synchronized { configuration }, A::ChangeFeature(change)) => {
            let local = apply_change(configuration, &change);
            Transition::to(diverged_or_synchronized(local, configuration.clone()))
        }
        (
            S::Diverged {
                local_configuration,
                backend_configuration,
            },
            A::ChangeFeature(change),
        ) => {
            let local = apply_change(local_configuration, &change);
            Transition::to(diverged_or_synchronized(
                local,
                backend_configuration.clone(),
            ))
        }
        (
            S::Diverged {
                local_configuration,
                ..
            },
            A::Synchronize,
        ) => Transition::effect(Effect::PushThenFetch(local_configuration.clone())),
        (S::Synchronized { .. } | S::Diverged { .. }, A::Reset) => {
            Transition::effect(Effect::PushThenFetch(Configuration::empty()))
        }
        (S::Error { .. }, A::Retry) => Transition {
            next: Some(S::Uninitialized),
            effect: Some(Effect::Initialize),
        },
        _ => Transition::ignored(),
    }
}

/// Map the outcome of an [`Effect`] to the state it settles in.
pub fn settle(result: Result<Configuration, RemoteError>) -> ConfigurationState {
    match result {
        Ok(configuration) => ConfigurationState::Synchronized { configuration },
        Err(cause) => ConfigurationState::Error { cause },
    }
}

/// Collapse back to `Synchronized` when edits cancel out.
fn diverged_or_synchronized(local: Configuration, backend: Configuration) -> ConfigurationState {
    if local == backend {
        ConfigurationState::Synchronized {
            configuration: backend,
        }
    } else {
        ConfigurationState::Diverged {
            local_configuration: local,
            backend_configuration: backend,
        }
    }
}
