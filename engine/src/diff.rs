//! Diff/merge engine: pure set algebra over configuration slots.
//!
//! Every function here is total and side-effect free. An absent slot is
//! treated as empty and comes back initialized, so applying any delta to a
//! `None` slot yields `Some(..)`.

use crate::configuration::{PidMap, PidSet, UprobeSet, UprobeSpec};
use crate::{ChangeFeature, Configuration, DurationThreshold, Feature};

/// `(current ∪ add) \ remove`. Removal is applied last, so it wins.
pub fn update_pid_set(current: Option<&PidSet>, add: &PidSet, remove: &PidSet) -> PidSet {
    let mut pids = current.cloned().unwrap_or_default();
    pids.extend(add.iter().copied());
    pids.retain(|pid| !remove.contains(pid));
    pids
}

/// Map counterpart of [`update_pid_set`]. Removal is by key regardless of value;
/// an added key that already exists takes the new value.
pub fn update_pid_map<V: Clone>(
    current: Option<&PidMap<V>>,
    add: &PidMap<V>,
    remove: &PidSet,
) -> PidMap<V> {
    let mut entries = current.cloned().unwrap_or_default();
    entries.extend(add.iter().map(|(pid, value)| (*pid, value.clone())));
    entries.retain(|pid, _| !remove.contains(pid));
    entries
}

/// `(current \ remove) ∪ add`, deduplicated by full tuple identity.
pub fn update_uprobes(current: &UprobeSet, add: &UprobeSet, remove: &UprobeSet) -> UprobeSet {
    current
        .difference(remove)
        .chain(add.iter())
        .cloned()
        .collect()
}

/// Apply a single feature edit, passing every other slot through unchanged.
pub fn apply_change(config: &Configuration, action: &ChangeFeature) -> Configuration {
    let (add, remove) = action.delta().split();
    let mut next = config.clone();

    match &action.feature {
        Feature::VfsWrite => {
            next.vfs_write = Some(update_pid_set(config.vfs_write.as_ref(), &add, &remove));
        }
        Feature::SendMessage { threshold } => {
            next.sys_sendmsg = Some(update_pid_map(
                config.sys_sendmsg.as_ref(),
                &with_threshold(&add, *threshold),
                &remove,
            ));
        }
        Feature::JniReferences => {
            next.jni_references =
                Some(update_pid_set(config.jni_references.as_ref(), &add, &remove));
        }
        Feature::Sigquit => {
            next.sys_sigquit = Some(update_pid_set(config.sys_sigquit.as_ref(), &add, &remove));
        }
        Feature::Gc => {
            next.gc = Some(update_pid_set(config.gc.as_ref(), &add, &remove));
        }
        Feature::OpenFileDescriptors => {
            next.sys_fd_tracking =
                Some(update_pid_set(config.sys_fd_tracking.as_ref(), &add, &remove));
        }
        Feature::Uprobe {
            function_name,
            target_module,
            offset,
        } => {
            let specs = |pids: &PidSet| -> UprobeSet {
                pids.iter()
                    .map(|pid| UprobeSpec::new(function_name, target_module, *offset, *pid))
                    .collect()
            };
            next.uprobes = update_uprobes(&config.uprobes, &specs(&add), &specs(&remove));
        }
    }

    next
}

/// Apply edits left to right.
pub fn apply_changes<'a>(
    config: &Configuration,
    actions: impl IntoIterator<Item = &'a ChangeFeature>,
) -> Configuration {
    actions
        .into_iter()
        .fold(config.clone(), |acc, action| apply_change(&acc, action))
}

fn with_threshold(pids: &PidSet, threshold: DurationThreshold) -> PidMap<DurationThreshold> {
    pids.iter().map(|pid| (*pid, threshold)).collect()
}
