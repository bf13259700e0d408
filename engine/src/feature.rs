//! Features and the actions that edit them.
//!
//! Edits are expressed as actions rather than direct mutations of a
//! [`Configuration`](crate::Configuration). The diff engine turns an action
//! into a new configuration value.

use crate::{configuration::PidSet, DurationThreshold, Error, Pid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a configuration slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTag {
    VfsWrite,
    SendMessage,
    JniReferences,
    Sigquit,
    Gc,
    OpenFileDescriptors,
    Uprobe,
}

impl FeatureTag {
    /// Every slot, in declaration order.
    pub const ALL: [FeatureTag; 7] = [
        FeatureTag::VfsWrite,
        FeatureTag::SendMessage,
        FeatureTag::JniReferences,
        FeatureTag::Sigquit,
        FeatureTag::Gc,
        FeatureTag::OpenFileDescriptors,
        FeatureTag::Uprobe,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureTag::VfsWrite => "vfs_write",
            FeatureTag::SendMessage => "send_message",
            FeatureTag::JniReferences => "jni_references",
            FeatureTag::Sigquit => "sigquit",
            FeatureTag::Gc => "gc",
            FeatureTag::OpenFileDescriptors => "open_file_descriptors",
            FeatureTag::Uprobe => "uprobe",
        }
    }
}

impl fmt::Display for FeatureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FeatureTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}

/// A feature together with the payload needed to enable it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    VfsWrite,
    /// Blocking sendmsg calls longer than `threshold` nanoseconds
    SendMessage {
        threshold: DurationThreshold,
    },
    JniReferences,
    Sigquit,
    Gc,
    OpenFileDescriptors,
    /// A uprobe on a single symbol; one entry is created per PID
    #[serde(rename_all = "camelCase")]
    Uprobe {
        function_name: String,
        target_module: String,
        offset: u64,
    },
}

impl Feature {
    /// The slot this feature edits.
    pub fn tag(&self) -> FeatureTag {
        match self {
            Feature::VfsWrite => FeatureTag::VfsWrite,
            Feature::SendMessage { .. } => FeatureTag::SendMessage,
            Feature::JniReferences => FeatureTag::JniReferences,
            Feature::Sigquit => FeatureTag::Sigquit,
            Feature::Gc => FeatureTag::Gc,
            Feature::OpenFileDescriptors => FeatureTag::OpenFileDescriptors,
            Feature::Uprobe { .. } => FeatureTag::Uprobe,
        }
    }
}

/// Direction of a PID edit. A single action can only add or remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "pids", rename_all = "snake_case")]
pub enum PidDelta {
    Add(PidSet),
    Remove(PidSet),
}

impl PidDelta {
    /// Split into `(add, remove)`; exactly one side is non-empty at most.
    pub fn split(self) -> (PidSet, PidSet) {
        match self {
            PidDelta::Add(pids) => (pids, PidSet::new()),
            PidDelta::Remove(pids) => (PidSet::new(), pids),
        }
    }

    /// The PIDs touched by this delta.
    pub fn pids(&self) -> &PidSet {
        match self {
            PidDelta::Add(pids) | PidDelta::Remove(pids) => pids,
        }
    }
}

/// Enable or disable a feature for a set of PIDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeature {
    pub feature: Feature,
    pub enable: bool,
    pub pids: PidSet,
}

impl ChangeFeature {
    /// Enable `feature` for `pids`.
    pub fn enable(feature: Feature, pids: impl IntoIterator<Item = Pid>) -> Self {
        Self {
            feature,
            enable: true,
            pids: pids.into_iter().collect(),
        }
    }

    /// Disable `feature` for `pids`.
    pub fn disable(feature: Feature, pids: impl IntoIterator<Item = Pid>) -> Self {
        Self {
            feature,
            enable: false,
            pids: pids.into_iter().collect(),
        }
    }

    /// The PID edit this action describes.
    pub fn delta(&self) -> PidDelta {
        if self.enable {
            PidDelta::Add(self.pids.clone())
        } else {
            PidDelta::Remove(self.pids.clone())
        }
    }
}

/// Actions accepted by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigurationAction {
    /// Edit the local configuration
    ChangeFeature(ChangeFeature),
    /// Push local edits to the remote store
    Synchronize,
    /// Replace the remote configuration with the empty one
    Reset,
    /// Re-run the initial fetch after an error
    Retry,
}

impl From<ChangeFeature> for ConfigurationAction {
    fn from(change: ChangeFeature) -> Self {
        ConfigurationAction::ChangeFeature(change)
    }
}

impl ConfigurationAction {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigurationAction::ChangeFeature(_) => "change_feature",
            ConfigurationAction::Synchronize => "synchronize",
            ConfigurationAction::Reset => "reset",
            ConfigurationAction::Retry => "retry",
        }
    }
}
