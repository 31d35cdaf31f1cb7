//! # Filesystem Asset Store
//!
//! Serves downloadable assets from a directory on local disk.

use async_trait::async_trait;
use drop_core::{AssetStore, StoreError, StoredAsset};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

/// Asset store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a resource key to a path under the root.
    ///
    /// Keys must be relative and may not climb out of the root.
    fn key_to_path(&self, resource_key: &str) -> Result<PathBuf, StoreError> {
        if resource_key.is_empty()
            || resource_key.starts_with('/')
            || resource_key.starts_with('\\')
            || resource_key.contains('\0')
            || resource_key.split(['/', '\\']).any(|seg| seg == "..")
        {
            return Err(StoreError::InvalidKey(resource_key.to_string()));
        }

        Ok(self.root.join(resource_key))
    }

    /// Resolve symlinks and make sure the file is still inside the root
    async fn contained(&self, path: &Path, resource_key: &str) -> Result<Option<PathBuf>, StoreError> {
        let canonical = match fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let root = fs::canonicalize(&self.root).await?;

        if canonical.strip_prefix(&root).is_err() {
            return Err(StoreError::InvalidKey(resource_key.to_string()));
        }

        Ok(Some(canonical))
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn fetch(&self, resource_key: &str) -> Result<Option<StoredAsset>, StoreError> {
        let path = self.key_to_path(resource_key)?;

        let Some(path) = self.contained(&path, resource_key).await? else {
            debug!("Asset not found: {}", resource_key);
            return Ok(None);
        };

        let metadata = fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let file = fs::File::open(&path).await?;

        let key = resource_key.to_string();
        let stream = ReaderStream::new(file).map(move |chunk| {
            chunk.map_err(|e| {
                error!(key = %key, "Asset read failed: {}", e);
                StoreError::ReadFailed(e.to_string())
            })
        });

        Ok(Some(StoredAsset {
            size: metadata.len(),
            stream: Box::pin(stream),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
