//! In-memory remote store.
//!
//! Stands in for the backend of record in tests and demos. Every call is
//! logged, failures can be injected one call at a time, and an artificial
//! latency keeps operations in flight long enough to observe queuing.

use super::RemoteConfigClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracesync_engine::{Configuration, RemoteError};

/// A call observed by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch,
    Push(Configuration),
}

/// Remote store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    stored: Mutex<Option<Configuration>>,
    calls: Mutex<Vec<RemoteCall>>,
    fetch_failures: Mutex<VecDeque<RemoteError>>,
    push_failures: Mutex<VecDeque<RemoteError>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryRemote {
    /// A store that has never been written; the first fetch reports `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `configuration`.
    pub fn with_configuration(configuration: Configuration) -> Self {
        let remote = Self::new();
        *remote.stored.lock() = Some(configuration);
        remote
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next fetch with `error`. Queued failures are consumed in order.
    pub fn fail_next_fetch(&self, error: RemoteError) {
        self.fetch_failures.lock().push_back(error);
    }

    /// Fail the next push with `error`. Queued failures are consumed in order.
    pub fn fail_next_push(&self, error: RemoteError) {
        self.push_failures.lock().push_back(error);
    }

    /// Replace the stored value, as another writer would.
    pub fn set_configuration(&self, configuration: Option<Configuration>) {
        *self.stored.lock() = configuration;
    }

    /// The stored value, if any.
    pub fn stored(&self) -> Option<Configuration> {
        self.stored.lock().clone()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Pushed configurations, in order.
    pub fn pushes(&self) -> Vec<Configuration> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Push(config) => Some(config.clone()),
                RemoteCall::Fetch => None,
            })
            .collect()
    }

    /// Highest number of calls that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: RemoteCall) -> InFlight<'_> {
        self.calls.lock().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

/// Decrements the in-flight counter when the call finishes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteConfigClient for MemoryRemote {
    async fn fetch(&self) -> Result<Configuration, RemoteError> {
        let _guard = self.enter(RemoteCall::Fetch).await;

        if let Some(error) = self.fetch_failures.lock().pop_front() {
            return Err(error);
        }
        self.stored.lock().clone().ok_or(RemoteError::NotFound)
    }

    async fn push(&self, configuration: &Configuration) -> Result<(), RemoteError> {
        let _guard = self.enter(RemoteCall::Push(configuration.clone())).await;

        if let Some(error) = self.push_failures.lock().pop_front() {
            return Err(error);
        }
        *self.stored.lock() = Some(configuration.clone());
        Ok(())
    }
}
