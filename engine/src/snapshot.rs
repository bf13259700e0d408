//! Snapshot type for persisting a configuration outside the engine.
//!
//! Snapshots are the bridge between a [`Configuration`] value and whatever
//! storage a remote backend uses. Slots are ordered sets and maps, so
//! serialization is deterministic.

use crate::{error::Result, Configuration, Error};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// The stored configuration
    pub configuration: Configuration,
}

impl ConfigurationSnapshot {
    /// Wrap a configuration in the current format.
    pub fn new(configuration: Configuration) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            configuration,
        }
    }

    /// Unwrap the stored configuration.
    pub fn into_configuration(self) -> Configuration {
        self.configuration
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON. Only the current format version is accepted.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::SnapshotVersionMismatch {
                expected: SNAPSHOT_FORMAT_VERSION,
                actual: snapshot.format_version,
            });
        }

        Ok(snapshot)
    }
}

impl From<Configuration> for ConfigurationSnapshot {
    fn from(configuration: Configuration) -> Self {
        Self::new(configuration)
    }
}
