//! In-memory backend for tests

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::backend::{with_trailing_slash, StorageBackend, StorageError, StorageResult};

/// In-memory storage backend for testing
pub struct MemoryBackend {
    files: tokio::sync::RwLock<HashMap<String, Bytes>>,
    base_path: String,
    public_url: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_paths("memory:/", "/uploads")
    }

    pub fn with_paths(base_path: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            files: tokio::sync::RwLock::new(HashMap::new()),
            base_path: with_trailing_slash(base_path),
            public_url: with_trailing_slash(public_url),
        }
    }

    /// Bytes stored under `path`, for assertions
    pub async fn contents(&self, path: &str) -> Option<Bytes> {
        let files = self.files.read().await;
        files.get(path).cloned()
    }

    /// Number of stored files, for assertions
    pub async fn file_count(&self) -> usize {
        let files = self.files.read().await;
        files.len()
    }

    /// Stored paths, for assertions
    pub async fn paths(&self) -> Vec<String> {
        let files = self.files.read().await;
        let mut paths: Vec<String> = files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write_file(&self, src: &Path, dest: &str) -> StorageResult<()> {
        let data = fs::read(src)
            .await
            .map_err(|_| StorageError::NotFound(src.to_string_lossy().to_string()))?;

        let mut files = self.files.write().await;
        files.insert(dest.to_string(), Bytes::from(data));
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        let files = self.files.read().await;
        Ok(files.contains_key(path))
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files.remove(path);
        Ok(())
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn public_url_prefix(&self) -> &str {
        &self.public_url
    }

    fn name(&self) -> &str {
        "memory"
    }
}
