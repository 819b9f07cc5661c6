//! Lifecycle controller errors

use affix_core::{ConfigError, ValidationErrors};
use affix_imaging::TransformError;
use affix_records::RecordError;
use affix_storage::StorageError;
use thiserror::Error;

/// Errors raised while running attachment lifecycle hooks.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
