//! Storage backend trait
//!
//! The backend boundary is deliberately narrow: copy a local staging file in,
//! check existence, delete, and report the two location prefixes that get
//! frozen into attachment metadata. Reading bytes back out is not part of the
//! lifecycle and stays outside this trait.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend - unified interface for attachment byte storage
///
/// All `dest`/`path` arguments are backend-relative, never absolute. The
/// complete path of a stored file is `base_path() + relative path` and its
/// public URL is `public_url_prefix() + relative path`; both prefixes end
/// with a slash.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Copy the local file at `src` to `dest` inside the backend
    async fn write_file(&self, src: &Path, dest: &str) -> StorageResult<()>;

    /// Check whether `path` exists in the backend
    async fn file_exists(&self, path: &str) -> StorageResult<bool>;

    /// Remove `path` from the backend. Deleting a path that does not exist
    /// is not an error.
    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    /// Root prefix recorded into complete paths
    fn base_path(&self) -> &str;

    /// URL prefix recorded into web paths
    fn public_url_prefix(&self) -> &str;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Normalize a path prefix to end with exactly one slash
pub(crate) fn with_trailing_slash(value: impl Into<String>) -> String {
    let mut value = value.into();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_trailing_slash() {
        assert_eq!(with_trailing_slash("uploads"), "uploads/");
        assert_eq!(with_trailing_slash("uploads/"), "uploads/");
        assert_eq!(with_trailing_slash(""), "/");
    }
}
