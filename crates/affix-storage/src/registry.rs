//! Backend registry
//!
//! Which backend a slot uses is resolved exactly once, when the slot's
//! controller is built. Precedence, lowest to highest:
//!
//! 1. built-in default: the local backend registered by
//!    [`BackendRegistry::with_local`] (and set as the registry default)
//! 2. registry entries: [`BackendRegistry::register`] adds or replaces a
//!    named backend; [`BackendRegistry::set_default`] repoints the default
//! 3. per-slot name: [`BackendChoice::Named`] picks a registry entry
//! 4. per-call override: [`BackendChoice::Override`] supplies the backend
//!    directly, bypassing the registry

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use affix_core::ConfigError;

use crate::backend::{with_trailing_slash, StorageBackend};
use crate::local::LocalBackend;

/// Configuration for the built-in local backend
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory files are written under
    pub base_dir: String,
    /// URL prefix stored files are served from
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: "uploads/".to_string(),
            public_url: "/uploads/".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: std::env::var("UPLOAD_BASE_DIR")
                .map(with_trailing_slash)
                .unwrap_or_else(|_| "uploads/".to_string()),
            public_url: std::env::var("UPLOAD_PUBLIC_URL")
                .map(with_trailing_slash)
                .unwrap_or_else(|_| "/uploads/".to_string()),
        }
    }
}

/// How a slot picks its backend out of the registry
#[derive(Clone, Default)]
pub enum BackendChoice {
    /// Use the registry default
    #[default]
    Default,
    /// Use the registry entry with this name
    Named(String),
    /// Use this backend directly
    Override(Arc<dyn StorageBackend>),
}

impl std::fmt::Debug for BackendChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Named(name) => write!(f, "Named({})", name),
            Self::Override(backend) => write!(f, "Override({})", backend.name()),
        }
    }
}

/// Registry of named storage backends
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
    default_name: Option<String>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// An empty registry with no default; every slot must then name or
    /// override its backend
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// A registry seeded with the built-in local backend under "local",
    /// which is also the default
    pub fn with_local(config: &StorageConfig) -> Self {
        let mut registry = Self::new();
        registry.register("local", Arc::new(LocalBackend::from_config(config)));
        registry.default_name = Some("local".to_string());
        registry
    }

    /// Add or replace a named backend
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) {
        let name = name.into();
        debug!(backend = %name, "Storage backend registered");
        self.backends.insert(name, backend);
    }

    /// Point the registry default at a registered name
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_name = Some(name.into());
    }

    /// Resolve the backend a slot will use. Called once at bind time; the
    /// result is held by the controller for its whole life.
    pub fn resolve(
        &self,
        slot: &str,
        choice: &BackendChoice,
    ) -> Result<Arc<dyn StorageBackend>, ConfigError> {
        match choice {
            BackendChoice::Override(backend) => Ok(Arc::clone(backend)),
            BackendChoice::Named(name) => {
                self.backends
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownBackend {
                        slot: slot.to_string(),
                        name: name.clone(),
                    })
            }
            BackendChoice::Default => self
                .default_name
                .as_ref()
                .and_then(|name| self.backends.get(name))
                .cloned()
                .ok_or_else(|| ConfigError::UnboundBackend {
                    slot: slot.to_string(),
                }),
        }
    }
}
