//! The configuration model: independently scoped instrumentation features.
//!
//! A [`Configuration`] is a plain value. Every edit produces a new value via
//! the diff engine; nothing here mutates shared state.

use crate::{DurationThreshold, FeatureTag, Pid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Set of process identifiers a feature is enabled for.
pub type PidSet = BTreeSet<Pid>;

/// Process identifiers with a per-process parameter.
pub type PidMap<V> = BTreeMap<Pid, V>;

/// Default duration threshold for send-message tracing, in nanoseconds.
pub const DEFAULT_DURATION_THRESHOLD: DurationThreshold = 32_000_000;

/// A single instrumentation point.
///
/// Identity is the full tuple; ordering exists only so that uprobes can
/// live in an ordered set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UprobeSpec {
    /// Symbol to attach to
    pub function_name: String,
    /// Binary or odex file containing the symbol
    pub target_module: String,
    /// Offset of the symbol inside the target
    pub offset: u64,
    /// Process the probe is scoped to
    pub pid: Pid,
}

impl UprobeSpec {
    /// Create a new uprobe specification.
    pub fn new(
        function_name: impl Into<String>,
        target_module: impl Into<String>,
        offset: u64,
        pid: Pid,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            target_module: target_module.into(),
            offset,
            pid,
        }
    }
}

/// Uprobe collection. Set semantics, serialized as a JSON array.
pub type UprobeSet = BTreeSet<UprobeSpec>;

/// Instrumentation configuration for all features.
///
/// `None` in an optional slot means "never configured", which is distinct
/// from `Some(empty)` ("explicitly off for everyone"). Equality is
/// structural over every slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// vfs_write tracing
    pub vfs_write: Option<PidSet>,
    /// sendmsg blocking-call tracing with a duration threshold per PID
    pub sys_sendmsg: Option<PidMap<DurationThreshold>>,
    /// User-space probes
    #[serde(default)]
    pub uprobes: UprobeSet,
    /// Local and global JNI reference tracking
    pub jni_references: Option<PidSet>,
    /// SIGQUIT tracking
    pub sys_sigquit: Option<PidSet>,
    /// Garbage collection tracking
    pub gc: Option<PidSet>,
    /// Open file descriptor tracking
    pub sys_fd_tracking: Option<PidSet>,
}

impl Configuration {
    /// The canonical empty configuration: every optional slot absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// PIDs a feature is enabled for. Absent slots yield an empty set.
    pub fn pids(&self, tag: FeatureTag) -> PidSet {
        match tag {
            FeatureTag::VfsWrite => self.vfs_write.clone().unwrap_or_default(),
            FeatureTag::SendMessage => self
                .sys_sendmsg
                .as_ref()
                .map(|m| m.keys().copied().collect())
                .unwrap_or_default(),
            FeatureTag::JniReferences => self.jni_references.clone().unwrap_or_default(),
            FeatureTag::Sigquit => self.sys_sigquit.clone().unwrap_or_default(),
            FeatureTag::Gc => self.gc.clone().unwrap_or_default(),
            FeatureTag::OpenFileDescriptors => self.sys_fd_tracking.clone().unwrap_or_default(),
            FeatureTag::Uprobe => self.uprobes.iter().map(|u| u.pid).collect(),
        }
    }

    /// Whether `tag` is enabled for `pid`.
    pub fn is_enabled_for(&self, tag: FeatureTag, pid: Pid) -> bool {
        match tag {
            FeatureTag::SendMessage => self
                .sys_sendmsg
                .as_ref()
                .is_some_and(|m| m.contains_key(&pid)),
            FeatureTag::Uprobe => self.uprobes.iter().any(|u| u.pid == pid),
            _ => self.pids(tag).contains(&pid),
        }
    }

    /// True when no feature is enabled for any PID.
    ///
    /// Note this is weaker than `== Configuration::empty()`: a slot holding
    /// an empty set counts as empty here but not for equality.
    pub fn is_empty(&self) -> bool {
        FeatureTag::ALL.iter().all(|tag| self.pids(*tag).is_empty())
    }
}
