//! The image transform boundary.
//!
//! The lifecycle controller never touches pixels itself. It hands a source
//! file to an [`ImageTransform`] implementation and gets back a staged temp
//! file holding the derived bytes. Implementations are expected to leave the
//! source file untouched.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use affix_storage::{StagedFile, StorageError};

/// Errors produced while deriving an image rendition.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Staging error: {0}")]
    Staging(#[from] StorageError),

    #[error("Transform task failed: {0}")]
    TaskFailed(String),
}

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;

/// How a resize treats the target box when the source aspect ratio differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Fit the whole image inside the box, shrinking the longer side.
    #[default]
    Inset,
    /// Fill the box completely, trimming whatever overflows.
    Outbound,
}

/// Boundary for producing derived image files.
///
/// Both operations stage their output as a temp file owned by the caller,
/// who moves the bytes into a storage backend and then discards the staging
/// copy. `quality` applies to lossy encodes and is ignored otherwise.
#[async_trait]
pub trait ImageTransform: Send + Sync {
    /// Resizes `src` to fit `width` x `height` under the given mode.
    ///
    /// A zero side is derived from the source aspect ratio. Passing zero for
    /// both sides is a caller bug; implementations fall back to the source
    /// dimensions rather than guessing.
    async fn resize(
        &self,
        src: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
        quality: u8,
    ) -> TransformResult<StagedFile>;

    /// Cuts a `width` x `height` window out of `src` starting at `origin`.
    ///
    /// The window is clamped to the source bounds. A zero side is derived
    /// from the source aspect ratio before clamping.
    async fn crop(
        &self,
        src: &Path,
        width: u32,
        height: u32,
        origin: (u32, u32),
        quality: u8,
    ) -> TransformResult<StagedFile>;
}
