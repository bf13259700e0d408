//! Integration tests for the synchronizer actor.
//!
//! These run the actor against `MemoryRemote` (and `FileRemote` for the
//! persistence test) and observe it only through its handle.

use std::sync::Arc;
use std::time::Duration;
use tracesync_engine::{
    ChangeFeature, Configuration, ConfigurationAction, ConfigurationState, Feature, PidSet,
    RemoteError,
};
use tracesync_synchronizer::{
    FileRemote, MemoryRemote, RemoteCall, Synchronizer, SynchronizerConfig, SynchronizerHandle,
};

fn vfs(pids: &[u32]) -> Configuration {
    Configuration {
        vfs_write: Some(pids.iter().copied().collect()),
        ..Configuration::empty()
    }
}

fn synced(configuration: Configuration) -> ConfigurationState {
    ConfigurationState::Synchronized { configuration }
}

fn spawn(remote: &Arc<MemoryRemote>) -> SynchronizerHandle {
    Synchronizer::spawn(remote.clone(), SynchronizerConfig::default())
}

#[cfg(test)]
mod initialization_tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_is_initialized_once() {
        let remote = Arc::new(MemoryRemote::new());
        let handle = spawn(&remote);

        let state = handle.wait_for_settled().await.unwrap();

        assert_eq!(state, synced(Configuration::empty()));
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Fetch,
                RemoteCall::Push(Configuration::empty()),
                RemoteCall::Fetch,
            ]
        );
        assert_eq!(remote.stored(), Some(Configuration::empty()));
    }

    #[tokio::test]
    async fn existing_store_is_only_fetched() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[7])));
        let handle = spawn(&remote);

        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[7])));
        assert_eq!(remote.calls(), vec![RemoteCall::Fetch]);
    }

    #[tokio::test]
    async fn other_fetch_failure_is_terminal() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_next_fetch(RemoteError::remote("connection refused"));
        let handle = spawn(&remote);

        let state = handle.wait_for_settled().await.unwrap();

        assert_eq!(
            state,
            ConfigurationState::Error {
                cause: RemoteError::remote("connection refused")
            }
        );
        // No initialization attempt for anything but NotFound.
        assert_eq!(remote.calls(), vec![RemoteCall::Fetch]);
    }

    #[tokio::test]
    async fn failed_initial_push_is_terminal() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_next_push(RemoteError::remote("read-only"));
        let handle = spawn(&remote);

        let state = handle.wait_for_settled().await.unwrap();

        assert!(state.is_error());
        assert_eq!(
            remote.calls(),
            vec![RemoteCall::Fetch, RemoteCall::Push(Configuration::empty())]
        );
    }

    #[tokio::test]
    async fn retry_recovers_from_error() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1])));
        remote.fail_next_fetch(RemoteError::remote("timeout"));
        let handle = spawn(&remote);
        assert!(handle.wait_for_settled().await.unwrap().is_error());

        // Edits are ignored while in error.
        handle
            .dispatch(ChangeFeature::enable(Feature::Gc, [2]))
            .unwrap();
        assert!(handle.wait_for_settled().await.unwrap().is_error());

        handle.dispatch(ConfigurationAction::Retry).unwrap();
        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[1])));
    }

    #[tokio::test]
    async fn actions_wait_for_initial_fetch() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1])));
        let handle = Synchronizer::spawn(
            remote.clone(),
            SynchronizerConfig::default().with_initial_delay(Duration::from_millis(30)),
        );

        assert_eq!(handle.current_state(), ConfigurationState::Uninitialized);
        handle
            .dispatch(ChangeFeature::enable(Feature::VfsWrite, [2]))
            .unwrap();

        let state = handle.wait_for_settled().await.unwrap();
        assert_eq!(
            state,
            ConfigurationState::Diverged {
                local_configuration: vfs(&[1, 2]),
                backend_configuration: vfs(&[1]),
            }
        );
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(vfs(&[1])).with_latency(Duration::from_millis(500)),
        );
        let handle = Synchronizer::spawn(
            remote.clone(),
            SynchronizerConfig::default().with_remote_timeout(Duration::from_millis(20)),
        );

        match handle.wait_for_settled().await.unwrap() {
            ConfigurationState::Error {
                cause: RemoteError::Remote(message),
            } => assert!(message.contains("fetch timed out")),
            other => panic!("unexpected state: {:?}", other),
        }
    }
}

#[cfg(test)]
mod editing_tests {
    use super::*;

    #[tokio::test]
    async fn edits_diverge_then_collapse() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1, 2])));
        let handle = spawn(&remote);
        handle.wait_for_settled().await.unwrap();

        handle
            .dispatch(ChangeFeature::disable(Feature::VfsWrite, [2]))
            .unwrap();
        assert_eq!(
            handle.wait_for_settled().await.unwrap(),
            ConfigurationState::Diverged {
                local_configuration: vfs(&[1]),
                backend_configuration: vfs(&[1, 2]),
            }
        );

        handle
            .dispatch(ChangeFeature::enable(Feature::VfsWrite, [2]))
            .unwrap();
        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[1, 2])));

        // Local edits never touch the remote.
        assert_eq!(remote.calls(), vec![RemoteCall::Fetch]);
    }

    #[tokio::test]
    async fn synchronize_pushes_then_fetches() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1])));
        let handle = spawn(&remote);

        handle
            .dispatch(ChangeFeature::enable(Feature::Gc, [5, 6]))
            .unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();

        let expected = Configuration {
            gc: Some(PidSet::from([5, 6])),
            ..vfs(&[1])
        };
        assert_eq!(
            handle.wait_for_settled().await.unwrap(),
            synced(expected.clone())
        );
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Fetch,
                RemoteCall::Push(expected.clone()),
                RemoteCall::Fetch
            ]
        );
        assert_eq!(remote.stored(), Some(expected));
    }

    #[tokio::test]
    async fn failed_push_then_retry_adopts_remote_value() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1])));
        let handle = spawn(&remote);
        handle.wait_for_settled().await.unwrap();

        handle
            .dispatch(ChangeFeature::enable(Feature::VfsWrite, [2]))
            .unwrap();
        handle.wait_for_settled().await.unwrap();

        remote.fail_next_push(RemoteError::remote("conflict"));
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        assert_eq!(
            handle.wait_for_settled().await.unwrap(),
            ConfigurationState::Error {
                cause: RemoteError::remote("conflict")
            }
        );

        // Another writer replaced the store meanwhile.
        remote.set_configuration(Some(vfs(&[9])));
        handle.dispatch(ConfigurationAction::Retry).unwrap();
        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[9])));
    }

    #[tokio::test]
    async fn reset_from_diverged() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1, 2])));
        let handle = spawn(&remote);

        handle
            .dispatch(ChangeFeature::disable(Feature::VfsWrite, [1]))
            .unwrap();
        handle.dispatch(ConfigurationAction::Reset).unwrap();

        assert_eq!(
            handle.wait_for_settled().await.unwrap(),
            synced(Configuration::empty())
        );
        assert_eq!(remote.pushes(), vec![Configuration::empty()]);
    }

    #[tokio::test]
    async fn synchronize_when_synchronized_is_ignored() {
        let remote = Arc::new(MemoryRemote::with_configuration(vfs(&[1])));
        let handle = spawn(&remote);

        handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[1])));
        assert_eq!(remote.calls(), vec![RemoteCall::Fetch]);
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    #[tokio::test]
    async fn back_to_back_synchronize_pushes_once() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(vfs(&[1])).with_latency(Duration::from_millis(20)),
        );
        let handle = spawn(&remote);

        handle
            .dispatch(ChangeFeature::enable(Feature::VfsWrite, [2]))
            .unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();

        assert_eq!(handle.wait_for_settled().await.unwrap(), synced(vfs(&[1, 2])));
        assert_eq!(remote.pushes(), vec![vfs(&[1, 2])]);
        assert_eq!(remote.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn queued_submits_apply_in_order() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(Configuration::empty())
                .with_latency(Duration::from_millis(10)),
        );
        let handle = spawn(&remote);

        for pid in 1..=3 {
            handle
                .dispatch(ChangeFeature::enable(Feature::Sigquit, [pid]))
                .unwrap();
            handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        }

        let state = handle.wait_for_settled().await.unwrap();
        let sigquit = |pids: &[u32]| Configuration {
            sys_sigquit: Some(pids.iter().copied().collect()),
            ..Configuration::empty()
        };
        assert_eq!(state, synced(sigquit(&[1, 2, 3])));
        assert_eq!(
            remote.pushes(),
            vec![sigquit(&[1]), sigquit(&[1, 2]), sigquit(&[1, 2, 3])]
        );
        assert_eq!(remote.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(vfs(&[1])).with_latency(Duration::from_millis(10)),
        );
        let handle = spawn(&remote);
        let state = handle.wait_until(|s| s.is_synchronized()).await.unwrap();
        assert_eq!(state, synced(vfs(&[1])));

        handle
            .dispatch(ChangeFeature::disable(Feature::VfsWrite, [1]))
            .unwrap();
        let diverged = handle
            .wait_until(|s| s.has_pending_changes())
            .await
            .unwrap();
        assert_eq!(diverged.local_configuration(), Some(&vfs(&[])));
    }

    #[tokio::test]
    async fn all_subscribers_settle_on_the_same_state() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(vfs(&[1, 2])).with_latency(Duration::from_millis(10)),
        );
        let handle = spawn(&remote);
        let mut first = handle.subscribe();
        let mut second = handle.subscribe();
        handle.wait_for_settled().await.unwrap();

        handle
            .dispatch(ChangeFeature::disable(Feature::VfsWrite, [2]))
            .unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        let settled = handle.wait_for_settled().await.unwrap();
        assert_eq!(settled, synced(vfs(&[1])));

        assert!(first.has_changed().unwrap());
        assert!(second.has_changed().unwrap());
        assert_eq!(*first.borrow_and_update(), settled);
        assert_eq!(*second.borrow_and_update(), settled);

        let late = handle.subscribe();
        assert_eq!(*late.borrow(), settled);
        assert_eq!(remote.pushes(), vec![vfs(&[1])]);
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let remote = Arc::new(
            MemoryRemote::with_configuration(vfs(&[1])).with_latency(Duration::from_millis(10)),
        );
        let handle = spawn(&remote);

        handle
            .dispatch(ChangeFeature::enable(Feature::VfsWrite, [4]))
            .unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();

        let state = handle.shutdown().await.unwrap();
        assert_eq!(state, synced(vfs(&[1, 4])));
        assert_eq!(remote.stored(), Some(vfs(&[1, 4])));
    }
}

#[cfg(test)]
mod file_remote_tests {
    use super::*;

    #[tokio::test]
    async fn configuration_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracesync.json");

        let handle = Synchronizer::spawn(FileRemote::new(&path), SynchronizerConfig::default());
        assert_eq!(
            handle.wait_for_settled().await.unwrap(),
            synced(Configuration::empty())
        );
        handle
            .dispatch(ChangeFeature::enable(
                Feature::SendMessage { threshold: 1_000 },
                [42],
            ))
            .unwrap();
        handle.dispatch(ConfigurationAction::Synchronize).unwrap();
        handle.shutdown().await.unwrap();

        let handle = Synchronizer::spawn(FileRemote::new(&path), SynchronizerConfig::default());
        let state = handle.wait_for_settled().await.unwrap();
        assert_eq!(
            state
                .local_configuration()
                .and_then(|c| c.sys_sendmsg.clone()),
            Some([(42, 1_000)].into_iter().collect())
        );
    }
}
