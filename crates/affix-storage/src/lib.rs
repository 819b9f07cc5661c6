//! # affix-storage
//!
//! Storage backend boundary for Affix.
//!
//! ## Features
//!
//! - The `StorageBackend` trait: write/exists/delete plus the base-path and
//!   public-URL accessors recorded into attachment metadata
//! - `LocalBackend` (filesystem) and `MemoryBackend` (tests)
//! - Staging-file helpers for spooling in-memory uploads before a backend write
//! - `BackendRegistry` resolving which backend a slot uses, with documented
//!   override precedence
//!
//! ## Example
//!
//! ```rust,ignore
//! use affix_storage::{BackendRegistry, StorageConfig};
//!
//! let registry = BackendRegistry::with_local(&StorageConfig::from_env());
//! let backend = registry.resolve("avatar", &BackendChoice::Default)?;
//! backend.write_file(staged.path(), "User/2026/08/21/abc123.png").await?;
//! ```

pub mod backend;
pub mod local;
pub mod memory;
pub mod registry;
pub mod staging;

pub use backend::{StorageBackend, StorageError, StorageResult};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use registry::{BackendChoice, BackendRegistry, StorageConfig};
pub use staging::{stage_bytes, staging_dir, StagedFile};
