//! Read-only projection of a configuration onto the PIDs a screen is editing.

use crate::configuration::{PidSet, DEFAULT_DURATION_THRESHOLD};
use crate::{Configuration, DurationThreshold, Feature, FeatureTag, Pid};
use serde::{Deserialize, Serialize};

/// How one feature looks from the point of view of a set of PIDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOption {
    /// Feature, with the payload needed to toggle it again
    pub feature: Feature,
    /// Enabled for at least one of the relevant PIDs
    pub enabled: bool,
    /// Every PID the feature is enabled for
    pub pids: PidSet,
}

/// List one option per PID-scoped feature, plus one per uprobe attached to a
/// relevant PID. Uprobes are listed only while active, so they are always
/// `enabled`.
pub fn feature_options(config: &Configuration, relevant_pids: &[Pid]) -> Vec<FeatureOption> {
    let any_relevant = |pids: &PidSet| relevant_pids.iter().any(|pid| pids.contains(pid));

    let mut options: Vec<FeatureOption> = FeatureTag::ALL
        .into_iter()
        .filter_map(|tag| {
            let feature = match tag {
                FeatureTag::VfsWrite => Feature::VfsWrite,
                FeatureTag::SendMessage => Feature::SendMessage {
                    threshold: send_message_threshold(config),
                },
                FeatureTag::JniReferences => Feature::JniReferences,
                FeatureTag::Sigquit => Feature::Sigquit,
                FeatureTag::Gc => Feature::Gc,
                FeatureTag::OpenFileDescriptors => Feature::OpenFileDescriptors,
                FeatureTag::Uprobe => return None,
            };
            let pids = config.pids(tag);
            Some(FeatureOption {
                feature,
                enabled: any_relevant(&pids),
                pids,
            })
        })
        .collect();

    options.extend(
        config
            .uprobes
            .iter()
            .filter(|uprobe| relevant_pids.contains(&uprobe.pid))
            .map(|uprobe| FeatureOption {
                feature: Feature::Uprobe {
                    function_name: uprobe.function_name.clone(),
                    target_module: uprobe.target_module.clone(),
                    offset: uprobe.offset,
                },
                enabled: true,
                pids: [uprobe.pid].into_iter().collect(),
            }),
    );

    options
}

// Re-enabling keeps whatever threshold is already in use.
fn send_message_threshold(config: &Configuration) -> DurationThreshold {
    config
        .sys_sendmsg
        .as_ref()
        .and_then(|entries| entries.values().next().copied())
        .unwrap_or(DEFAULT_DURATION_THRESHOLD)
}
