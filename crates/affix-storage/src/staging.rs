//! Staging-file helpers
//!
//! Uploads arrive as in-memory bytes but backends consume local source
//! files, so every write spools through a process-local staging file first.
//! Image transforms produce their outputs at the same location. Staging
//! files are removed explicitly after the backend write succeeds.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::backend::StorageResult;

/// Directory staging files are written to
pub fn staging_dir() -> PathBuf {
    std::env::temp_dir().join("affix-staging")
}

/// A file spooled to the staging directory
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Wrap an existing file; the caller hands over cleanup responsibility
    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staging file after a successful backend write
    pub async fn cleanup(self) -> StorageResult<()> {
        fs::remove_file(&self.path).await?;
        Ok(())
    }
}

/// Spool bytes into a fresh staging file named by a UUID plus `extension`
pub async fn stage_bytes(data: &[u8], extension: &str) -> StorageResult<StagedFile> {
    let dir = staging_dir();
    fs::create_dir_all(&dir).await?;

    let name = if extension.is_empty() {
        Uuid::new_v4().simple().to_string()
    } else {
        format!("{}.{}", Uuid::new_v4().simple(), extension)
    };
    let path = dir.join(name);

    let mut file = fs::File::create(&path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    Ok(StagedFile::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_and_cleanup() {
        let staged = stage_bytes(b"staged data", "txt").await.unwrap();
        assert!(staged.path().exists());
        assert!(staged.path().to_string_lossy().ends_with(".txt"));

        let written = fs::read(staged.path()).await.unwrap();
        assert_eq!(written, b"staged data");

        let path = staged.path().to_path_buf();
        staged.cleanup().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stage_without_extension() {
        let staged = stage_bytes(b"x", "").await.unwrap();
        let name = staged
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .to_string();
        assert!(!name.contains('.'));
        staged.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_names() {
        let a = stage_bytes(b"a", "bin").await.unwrap();
        let b = stage_bytes(b"b", "bin").await.unwrap();
        assert_ne!(a.path(), b.path());
        a.cleanup().await.unwrap();
        b.cleanup().await.unwrap();
    }
}
