//! The configuration synchronizer actor.
//!
//! A single task owns the remote client and the current state. Actions
//! arrive over an unbounded queue and are handled strictly in arrival order;
//! a remote call suspends the task, so at most one call is ever in flight
//! and later actions wait behind it. The state is published through a
//! `watch` channel: observers see the latest value, late subscribers only
//! the current one.

use crate::config::SynchronizerConfig;
use crate::error::{Result, SynchronizerError};
use crate::remote::RemoteConfigClient;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracesync_engine::{
    settle, transition, Configuration, ConfigurationAction, ConfigurationState, Effect,
    RemoteError,
};

/// Messages consumed by the actor.
#[derive(Debug)]
enum Command {
    Dispatch(ConfigurationAction),
    Shutdown,
}

/// Entry point: spawns the actor and hands back a [`SynchronizerHandle`].
pub struct Synchronizer<R> {
    remote: R,
    config: SynchronizerConfig,
    state: watch::Sender<ConfigurationState>,
    processed: watch::Sender<u64>,
}

impl<R: RemoteConfigClient + 'static> Synchronizer<R> {
    /// Start the actor on the current tokio runtime.
    ///
    /// The state starts as `Uninitialized`; the initial fetch runs after
    /// `config.initial_delay`.
    pub fn spawn(remote: R, config: SynchronizerConfig) -> SynchronizerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConfigurationState::Uninitialized);
        let (processed_tx, processed_rx) = watch::channel(0);

        let actor = Synchronizer {
            remote,
            config,
            state: state_tx,
            processed: processed_tx,
        };
        let task = tokio::spawn(actor.run(commands_rx));

        SynchronizerHandle {
            commands: commands_tx,
            state: state_rx,
            processed: processed_rx,
            // The initial fetch counts as the first unit of work.
            dispatched: AtomicU64::new(1),
            task,
        }
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if !self.config.initial_delay.is_zero() {
            tracing::debug!(delay = ?self.config.initial_delay, "Delaying initial fetch");
            tokio::time::sleep(self.config.initial_delay).await;
        }

        self.run_effect(Effect::Initialize).await;
        self.mark_processed();

        while let Some(command) = commands.recv().await {
            match command {
                Command::Dispatch(action) => self.handle(action).await,
                Command::Shutdown => {
                    tracing::debug!("Synchronizer shutting down");
                    break;
                }
            }
            self.mark_processed();
        }

        tracing::info!(state = self.state.borrow().name(), "Synchronizer stopped");
    }

    async fn handle(&self, action: ConfigurationAction) {
        let current = self.state.borrow().clone();
        let action_name = action.name();
        let step = transition(&current, action);

        if step.is_ignored() {
            tracing::debug!(
                action = action_name,
                state = current.name(),
                "Ignoring action"
            );
            return;
        }

        if let Some(next) = step.next {
            self.publish(next);
        }
        if let Some(effect) = step.effect {
            self.run_effect(effect).await;
        }
    }

    async fn run_effect(&self, effect: Effect) {
        let result = match effect {
            Effect::Initialize => self.initialize().await,
            Effect::PushThenFetch(configuration) => self.push_then_fetch(&configuration).await,
        };
        self.publish(settle(result));
    }

    /// Fetch; an empty store is written once with the empty configuration.
    async fn initialize(&self) -> std::result::Result<Configuration, RemoteError> {
        match self.fetch().await {
            Err(RemoteError::NotFound) => {
                tracing::info!("Remote store is empty, writing the empty configuration");
                self.push(&Configuration::empty()).await?;
                self.fetch().await
            }
            other => other,
        }
    }

    // The fetch stands in for a change notification the remote cannot send yet.
    async fn push_then_fetch(
        &self,
        configuration: &Configuration,
    ) -> std::result::Result<Configuration, RemoteError> {
        self.push(configuration).await?;
        self.fetch().await
    }

    async fn fetch(&self) -> std::result::Result<Configuration, RemoteError> {
        self.call("fetch", self.remote.fetch()).await
    }

    async fn push(&self, configuration: &Configuration) -> std::result::Result<(), RemoteError> {
        self.call("push", self.remote.push(configuration)).await
    }

    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = std::result::Result<T, RemoteError>>,
    ) -> std::result::Result<T, RemoteError> {
        tracing::debug!(op, "Remote call");

        let result = match self.config.remote_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(RemoteError::remote(format!(
                    "{} timed out after {:?}",
                    op, limit
                )))
            }),
            None => fut.await,
        };

        match &result {
            Err(e) if e.is_not_found() => tracing::debug!(op, "Remote store not found"),
            Err(e) => tracing::warn!(op, error = %e, "Remote call failed"),
            Ok(_) => {}
        }
        result
    }

    fn publish(&self, next: ConfigurationState) {
        let previous = self.state.send_replace(next);
        let current = self.state.borrow();
        if previous != *current {
            tracing::info!(from = previous.name(), to = current.name(), "State changed");
        }
    }

    fn mark_processed(&self) {
        self.processed.send_modify(|count| *count += 1);
    }
}

/// Handle to a running synchronizer.
///
/// Dropping every handle stops the actor once its queue is drained.
#[derive(Debug)]
pub struct SynchronizerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConfigurationState>,
    processed: watch::Receiver<u64>,
    dispatched: AtomicU64,
    task: JoinHandle<()>,
}

impl SynchronizerHandle {
    /// Queue an action. The outcome is observed through the state channel.
    pub fn dispatch(&self, action: impl Into<ConfigurationAction>) -> Result<()> {
        let action = action.into();
        tracing::debug!(action = action.name(), "Dispatching action");
        self.commands
            .send(Command::Dispatch(action))
            .map_err(|_| SynchronizerError::Closed)?;
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// The most recently published state.
    pub fn current_state(&self) -> ConfigurationState {
        self.state.borrow().clone()
    }

    /// A receiver for the latest published state.
    pub fn subscribe(&self) -> watch::Receiver<ConfigurationState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&ConfigurationState) -> bool,
    ) -> Result<ConfigurationState> {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SynchronizerError::Closed)?;
        Ok(matched.clone())
    }

    /// Wait until every action dispatched so far, and the initial fetch, has
    /// been handled, then return the resulting state.
    pub async fn wait_for_settled(&self) -> Result<ConfigurationState> {
        let target = self.dispatched.load(Ordering::SeqCst);
        let mut processed = self.processed.clone();
        processed
            .wait_for(|count| *count >= target)
            .await
            .map_err(|_| SynchronizerError::Closed)?;
        Ok(self.current_state())
    }

    /// Handle every queued action, then stop the actor.
    pub async fn shutdown(self) -> Result<ConfigurationState> {
        // Already stopped is fine; the join below still reports the outcome.
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|_| SynchronizerError::Closed)?;
        Ok(self.state.borrow().clone())
    }
}
