//! Archive sink: text and binary artifacts keyed by `{collection}/{category}/{filename}`.
//!
//! Writes go through a temp file and a rename so a crash never leaves a
//! half-written artifact under its final name.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Two-level location of an artifact inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobKey {
    pub collection: String,
    pub category: String,
    pub filename: String,
}

impl BlobKey {
    pub fn new(
        collection: impl Into<String>,
        category: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            category: category.into(),
            filename: filename.into(),
        }
    }

    /// Same directory, different file.
    pub fn with_filename(&self, filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..self.clone()
        }
    }

    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.collection)
            .join(&self.category)
            .join(&self.filename)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.category, self.filename)
    }
}

/// Where artifacts are persisted.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create or overwrite `key` with `bytes`.
    async fn write(&self, key: &BlobKey, bytes: &[u8]) -> Result<(), StoreError>;

    /// Move `from` to `to`, replacing any existing `to`.
    async fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError>;

    async fn read(&self, key: &BlobKey) -> Result<Vec<u8>, StoreError>;

    async fn exists(&self, key: &BlobKey) -> bool;
}

/// [`BlobStore`] over a local directory tree.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &BlobKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, key: &BlobKey, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_of(key);
        let write_err = |source| StoreError::WriteFailed {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError> {
        let from_path = self.path_of(from);
        let to_path = self.path_of(to);
        if let Some(parent) = to_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::WriteFailed {
                    path: to_path.clone(),
                    source,
                })?;
        }
        tokio::fs::rename(&from_path, &to_path)
            .await
            .map_err(|source| StoreError::RenameFailed {
                from: from_path.clone(),
                to: to_path.clone(),
                source,
            })?;
        debug!("Renamed {} → {}", from_path.display(), to_path.display());
        Ok(())
    }

    async fn read(&self, key: &BlobKey) -> Result<Vec<u8>, StoreError> {
        let path = self.path_of(key);
        tokio::fs::read(&path)
            .await
            .map_err(|source| StoreError::ReadFailed { path, source })
    }

    async fn exists(&self, key: &BlobKey) -> bool {
        tokio::fs::try_exists(self.path_of(key))
            .await
            .unwrap_or(false)
    }
}
