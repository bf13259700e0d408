//! Remote store persisted as a JSON snapshot file.

use super::RemoteConfigClient;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracesync_engine::{Configuration, ConfigurationSnapshot, RemoteError};

/// Backend of record kept in a single JSON file.
///
/// A missing file means the store has never been written. Writes go to a
/// sibling `.tmp` file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileRemote {
    path: PathBuf,
}

impl FileRemote {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RemoteConfigClient for FileRemote {
    async fn fetch(&self) -> Result<Configuration, RemoteError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(RemoteError::NotFound),
            Err(e) => {
                return Err(RemoteError::remote(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        ConfigurationSnapshot::from_json(&content)
            .map(ConfigurationSnapshot::into_configuration)
            .map_err(|e| RemoteError::remote(format!("{}: {}", self.path.display(), e)))
    }

    async fn push(&self, configuration: &Configuration) -> Result<(), RemoteError> {
        let content = ConfigurationSnapshot::new(configuration.clone())
            .to_json_pretty()
            .map_err(|e| RemoteError::remote(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RemoteError::remote(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            RemoteError::remote(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            RemoteError::remote(format!(
                "Failed to rename {} to {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })
    }
}
