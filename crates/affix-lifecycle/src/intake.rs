//! Upload intake sources
//!
//! An intake hands the controller uploads that arrived out-of-band, for
//! example as multipart form fields, keyed either by owner entity and
//! attribute or by a bare field name. [`MemoryIntake`] is an in-memory
//! implementation for tests and request-scoped staging.

use std::collections::HashMap;

use affix_core::StagedUpload;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Source of uploads that arrived outside the owning record itself.
#[async_trait]
pub trait UploadIntake: Send + Sync {
    /// Uploads staged for an entity attribute, e.g. form field `User[avatar]`.
    async fn for_owner(&self, entity: &str, attribute: &str) -> Vec<StagedUpload>;

    /// Uploads staged under a bare field name, e.g. form field `avatar`.
    async fn by_name(&self, attribute: &str) -> Vec<StagedUpload>;
}

/// In-memory upload intake.
#[derive(Debug, Default)]
pub struct MemoryIntake {
    uploads: RwLock<HashMap<String, Vec<StagedUpload>>>,
}

impl MemoryIntake {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_key(entity: &str, attribute: &str) -> String {
        format!("{}[{}]", entity, attribute)
    }

    /// Stage an upload under an entity attribute, e.g. `User[avatar]`.
    pub async fn stage_for_owner(&self, entity: &str, attribute: &str, upload: StagedUpload) {
        self.uploads
            .write()
            .await
            .entry(Self::owner_key(entity, attribute))
            .or_default()
            .push(upload);
    }

    /// Stage an upload under a bare field name.
    pub async fn stage_by_name(&self, attribute: &str, upload: StagedUpload) {
        self.uploads
            .write()
            .await
            .entry(attribute.to_string())
            .or_default()
            .push(upload);
    }
}

#[async_trait]
impl UploadIntake for MemoryIntake {
    async fn for_owner(&self, entity: &str, attribute: &str) -> Vec<StagedUpload> {
        self.uploads
            .read()
            .await
            .get(&Self::owner_key(entity, attribute))
            .cloned()
            .unwrap_or_default()
    }

    async fn by_name(&self, attribute: &str) -> Vec<StagedUpload> {
        self.uploads
            .read()
            .await
            .get(attribute)
            .cloned()
            .unwrap_or_default()
    }
}
