//! Local filesystem backend

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument};

use crate::backend::{with_trailing_slash, StorageBackend, StorageError, StorageResult};
use crate::registry::StorageConfig;

/// Local filesystem storage backend
pub struct LocalBackend {
    /// Root directory for stored files
    root: PathBuf,
    /// Root as the base-path prefix recorded into metadata
    base_path: String,
    /// URL prefix recorded into metadata
    public_url: String,
}

impl LocalBackend {
    /// Create a new local backend rooted at `root`
    pub fn new(root: impl AsRef<Path>, public_url: impl Into<String>) -> Self {
        let root = root.as_ref().to_path_buf();
        let base_path = with_trailing_slash(root.to_string_lossy().to_string());
        Self {
            root,
            base_path,
            public_url: with_trailing_slash(public_url),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.base_dir, &config.public_url)
    }

    /// Create a backend rooted in the system temp directory
    pub fn temp() -> std::io::Result<Self> {
        let dir = std::env::temp_dir().join("affix-uploads");
        std::fs::create_dir_all(&dir)?;
        Ok(Self::new(dir, "/uploads"))
    }

    /// Resolve a backend-relative path to a full path
    fn resolve_path(&self, path: &str) -> StorageResult<PathBuf> {
        // Prevent directory traversal
        if path.contains("..") || path.starts_with('/') || path.starts_with('\\') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(path))
    }

    /// Ensure parent directory exists
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn write_file(&self, src: &Path, dest: &str) -> StorageResult<()> {
        let path = self.resolve_path(dest)?;
        self.ensure_parent(&path).await?;

        if !src.exists() {
            return Err(StorageError::NotFound(src.to_string_lossy().to_string()));
        }

        fs::copy(src, &path).await?;
        debug!(path = ?path, "File stored");

        Ok(())
    }

    async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        let path = self.resolve_path(path)?;
        Ok(path.exists())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let path = self.resolve_path(path)?;

        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(path = ?path, "File deleted");
        }

        Ok(())
    }

    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn public_url_prefix(&self) -> &str {
        &self.public_url
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::stage_bytes;

    #[tokio::test]
    async fn test_write_exists_delete() {
        let backend = LocalBackend::temp().unwrap();
        let staged = stage_bytes(b"hello", "txt").await.unwrap();

        backend
            .write_file(staged.path(), "Post/2026/08/21/abc.txt")
            .await
            .unwrap();
        assert!(backend.file_exists("Post/2026/08/21/abc.txt").await.unwrap());

        backend.delete_file("Post/2026/08/21/abc.txt").await.unwrap();
        assert!(!backend.file_exists("Post/2026/08/21/abc.txt").await.unwrap());

        staged.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let backend = LocalBackend::temp().unwrap();
        backend.delete_file("nothing/here.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = LocalBackend::temp().unwrap();

        let result = backend.file_exists("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));

        let result = backend.delete_file("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_write_missing_source() {
        let backend = LocalBackend::temp().unwrap();

        let result = backend
            .write_file(Path::new("/definitely/not/there.bin"), "dest.bin")
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_prefixes_end_with_slash() {
        let backend = LocalBackend::new("/srv/uploads", "/files");
        assert_eq!(backend.base_path(), "/srv/uploads/");
        assert_eq!(backend.public_url_prefix(), "/files/");
    }
}
