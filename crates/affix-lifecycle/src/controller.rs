//! Attachment lifecycle controller
//!
//! One [`AttachmentLifecycle`] binds one attachment slot on one owning
//! record type. Hosts call its hooks from the owner's own persistence
//! cycle: [`before_validate`](AttachmentLifecycle::before_validate) stages
//! uploads, [`before_save`](AttachmentLifecycle::before_save) clears old
//! rows when the slot is configured to, and
//! [`after_save`](AttachmentLifecycle::after_save) persists records, writes
//! bytes and derives variants. Configuration problems surface when the slot
//! is bound, never on the first upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use affix_core::{ConfigError, Id, OwningRecord, StagedUpload, ValidationErrors};
use affix_imaging::{extract_exif, ImageEngine, ImageTransform, TransformStep, VariantProfile};
use affix_records::{FileRecord, RecordStore};
use affix_storage::{
    stage_bytes, BackendChoice, BackendRegistry, StagedFile, StorageBackend, StorageConfig,
    StorageError,
};

use crate::error::{LifecycleError, LifecycleResult};
use crate::event::UploadCompleted;
use crate::intake::UploadIntake;
use crate::slot::{SaveAction, SlotReader, SlotValue, SlotWriter, DEFAULT_SCENARIOS};

/// Step-by-step binding of an attachment slot.
///
/// Obtained from [`AttachmentLifecycle::builder`]. [`build`](Self::build)
/// resolves the storage backend and validates the configured profiles.
pub struct LifecycleBuilder<O: OwningRecord, St: RecordStore> {
    attribute: String,
    store: Arc<St>,
    registry: BackendRegistry,
    backend_choice: BackendChoice,
    transform: Arc<dyn ImageTransform>,
    intake: Option<Arc<dyn UploadIntake>>,
    read: Option<SlotReader<O>>,
    write: Option<SlotWriter<O>>,
    scenarios: Vec<String>,
    save_action: SaveAction,
    raw_save_action: Option<String>,
    instance_by_name: bool,
    path_override: Option<String>,
    variant_path_override: Option<String>,
    user_id: Option<Id>,
    image_steps: Vec<TransformStep>,
    variants: BTreeMap<String, VariantProfile>,
}

impl<O: OwningRecord, St: RecordStore> LifecycleBuilder<O, St> {
    pub fn new(attribute: impl Into<String>, store: Arc<St>) -> Self {
        Self {
            attribute: attribute.into(),
            store,
            registry: BackendRegistry::with_local(&StorageConfig::from_env()),
            backend_choice: BackendChoice::Default,
            transform: Arc::new(ImageEngine::new()),
            intake: None,
            read: None,
            write: None,
            scenarios: DEFAULT_SCENARIOS.iter().map(|s| s.to_string()).collect(),
            save_action: SaveAction::default(),
            raw_save_action: None,
            instance_by_name: false,
            path_override: None,
            variant_path_override: None,
            user_id: None,
            image_steps: Vec::new(),
            variants: BTreeMap::new(),
        }
    }

    /// Closure reading the slot value off the owner.
    pub fn read_with<F>(mut self, read: F) -> Self
    where
        F: Fn(&O) -> SlotValue + Send + Sync + 'static,
    {
        self.read = Some(Box::new(read));
        self
    }

    /// Closure writing resolved uploads back onto the owner, so the host's
    /// own validation sees them.
    pub fn write_with<F>(mut self, write: F) -> Self
    where
        F: Fn(&mut O, SlotValue) + Send + Sync + 'static,
    {
        self.write = Some(Box::new(write));
        self
    }

    /// Replace the backend registry consulted when the slot is bound.
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Pick the storage backend.
    pub fn backend(mut self, choice: BackendChoice) -> Self {
        self.backend_choice = choice;
        self
    }

    /// Pick a registered backend by name.
    pub fn backend_named(self, name: impl Into<String>) -> Self {
        self.backend(BackendChoice::Named(name.into()))
    }

    /// Bypass the registry with an explicit backend.
    pub fn backend_override(self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend(BackendChoice::Override(backend))
    }

    /// Source of uploads arriving outside the owner, e.g. multipart fields.
    pub fn intake(mut self, intake: Arc<dyn UploadIntake>) -> Self {
        self.intake = Some(intake);
        self
    }

    /// Resolve intake uploads by bare field name instead of owner scope.
    pub fn instance_by_name(mut self, by_name: bool) -> Self {
        self.instance_by_name = by_name;
        self
    }

    /// Replace the image transform. Defaults to the built-in engine.
    pub fn transform(mut self, transform: Arc<dyn ImageTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Owner scenarios uploads are staged in. Defaults to
    /// [`DEFAULT_SCENARIOS`].
    pub fn scenarios<I, S>(mut self, scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenarios = scenarios.into_iter().map(Into::into).collect();
        self
    }

    /// What happens to existing attachments when the owner is saved again.
    pub fn save_action(mut self, action: SaveAction) -> Self {
        self.save_action = action;
        self
    }

    /// Save action from a configuration string, parsed when the slot is
    /// bound.
    pub fn save_action_name(mut self, name: impl Into<String>) -> Self {
        self.raw_save_action = Some(name.into());
        self
    }

    /// Fixed storage directory for originals, replacing the derived
    /// `Entity/YYYY/MM/DD/` one.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path_override = Some(path.into());
        self
    }

    /// Fixed storage directory for variants whose profile carries no path
    /// of its own.
    pub fn variant_path(mut self, path: impl Into<String>) -> Self {
        self.variant_path_override = Some(path.into());
        self
    }

    /// Creator id stamped onto every record this slot persists.
    pub fn user(mut self, user_id: Id) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Transform steps applied to the original bytes before storage.
    pub fn image_steps(mut self, steps: Vec<TransformStep>) -> Self {
        self.image_steps = steps;
        self
    }

    /// Register a named variant profile.
    pub fn variant(mut self, name: impl Into<String>, profile: VariantProfile) -> Self {
        self.variants.insert(name.into(), profile);
        self
    }

    /// Resolve the backend, validate the configuration and produce the
    /// controller. Every configuration error surfaces here, before any
    /// upload is touched.
    pub fn build(self) -> Result<AttachmentLifecycle<O, St>, ConfigError> {
        if self.attribute.is_empty() {
            return Err(ConfigError::MissingAttribute);
        }
        let Some(read) = self.read else {
            return Err(ConfigError::MissingReadAccessor {
                slot: self.attribute,
            });
        };

        let save_action = match self.raw_save_action {
            Some(name) => match SaveAction::from_str(&name) {
                Some(action) => action,
                None => return Err(ConfigError::InvalidSaveAction(name)),
            },
            None => self.save_action,
        };

        let original_profile = if self.image_steps.is_empty() {
            None
        } else {
            let profile = VariantProfile::new(self.image_steps);
            profile.validate(&self.attribute)?;
            Some(profile)
        };
        for (name, profile) in &self.variants {
            profile.validate(name)?;
        }

        let backend = self
            .registry
            .resolve(&self.attribute, &self.backend_choice)?;
        debug!(slot = %self.attribute, backend = %backend.name(), "Attachment slot bound");

        Ok(AttachmentLifecycle {
            store: self.store,
            backend,
            transform: self.transform,
            intake: self.intake,
            attribute: self.attribute,
            read,
            write: self.write,
            scenarios: self.scenarios,
            save_action,
            instance_by_name: self.instance_by_name,
            path_override: self.path_override,
            variant_path_override: self.variant_path_override,
            user_id: self.user_id,
            original_profile,
            variants: self.variants,
            staged: RwLock::new(Vec::new()),
            event_handlers: Vec::new(),
        })
    }
}

/// Lifecycle controller for one attachment slot.
pub struct AttachmentLifecycle<O: OwningRecord, St: RecordStore> {
    store: Arc<St>,
    backend: Arc<dyn StorageBackend>,
    transform: Arc<dyn ImageTransform>,
    intake: Option<Arc<dyn UploadIntake>>,
    attribute: String,
    read: SlotReader<O>,
    write: Option<SlotWriter<O>>,
    scenarios: Vec<String>,
    save_action: SaveAction,
    instance_by_name: bool,
    path_override: Option<String>,
    variant_path_override: Option<String>,
    user_id: Option<Id>,
    original_profile: Option<VariantProfile>,
    variants: BTreeMap<String, VariantProfile>,
    staged: RwLock<Vec<StagedUpload>>,
    event_handlers: Vec<Box<dyn Fn(&UploadCompleted) + Send + Sync>>,
}

impl<O: OwningRecord, St: RecordStore> std::fmt::Debug for AttachmentLifecycle<O, St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentLifecycle")
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

impl<O: OwningRecord, St: RecordStore> AttachmentLifecycle<O, St> {
    /// Start binding a slot named `attribute` backed by `store`.
    pub fn builder(attribute: impl Into<String>, store: Arc<St>) -> LifecycleBuilder<O, St> {
        LifecycleBuilder::new(attribute, store)
    }

    /// The slot attribute this controller is bound to.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Register a handler fired once per original persisted by a save.
    pub fn on_upload_completed<F>(&mut self, handler: F)
    where
        F: Fn(&UploadCompleted) + Send + Sync + 'static,
    {
        self.event_handlers.push(Box::new(handler));
    }

    /// Stage the slot's uploads ahead of owner validation.
    ///
    /// A value already on the owner wins; otherwise the intake is asked.
    /// Resolved uploads are written back onto the owner so its validation
    /// rules can see them. Does nothing when the owner's scenario is not
    /// handled, or when nothing was uploaded.
    #[instrument(skip(self, owner), fields(slot = %self.attribute))]
    pub async fn before_validate(&self, owner: &mut O) -> LifecycleResult<()> {
        if !self.scenario_allows(owner) {
            debug!(scenario = owner.scenario(), "Scenario not handled, uploads left alone");
            return Ok(());
        }

        let mut uploads = (self.read)(owner).uploads();
        if uploads.is_empty() {
            if let Some(intake) = &self.intake {
                uploads = if self.instance_by_name {
                    intake.by_name(&self.attribute).await
                } else {
                    intake.for_owner(O::ENTITY_TYPE, &self.attribute).await
                };
            }
        }
        if uploads.is_empty() {
            return Ok(());
        }

        if let Some(write) = &self.write {
            let value = if uploads.len() == 1 {
                SlotValue::Single(uploads[0].clone())
            } else {
                SlotValue::Many(uploads.clone())
            };
            write(owner, value);
        }

        debug!(count = uploads.len(), "Uploads staged");
        *self.staged.write().await = uploads;
        Ok(())
    }

    /// Clear the slot's existing attachments when it replaces on save.
    ///
    /// Only acts for [`SaveAction::Delete`], and only when uploads were
    /// actually staged for this save.
    #[instrument(skip(self, owner), fields(slot = %self.attribute))]
    pub async fn before_save(&self, owner: &O) -> LifecycleResult<()> {
        if !self.scenario_allows(owner) {
            return Ok(());
        }
        if self.save_action != SaveAction::Delete {
            return Ok(());
        }
        if self.staged.read().await.is_empty() {
            return Ok(());
        }
        let Some(owner_id) = owner.id() else {
            return Ok(());
        };

        let existing = self
            .store
            .get_for_slot(O::ENTITY_TYPE, owner_id, &self.attribute)
            .await?;
        if !existing.is_empty() {
            let removed = self.delete_records(existing).await?;
            info!(removed, "Existing attachments cleared before save");
        }
        Ok(())
    }

    /// Persist the staged uploads now that the owner itself is saved.
    ///
    /// Under [`SaveAction::Update`] the first staged upload replaces the
    /// slot's first existing attachment in place; everything else appends.
    /// Each persisted image original gets its configured variants, and one
    /// completion event fires per original. Fails before any I/O when the
    /// owner still has no primary key.
    #[instrument(skip(self, owner), fields(slot = %self.attribute))]
    pub async fn after_save(&self, owner: &O) -> LifecycleResult<Vec<FileRecord>> {
        let staged = std::mem::take(&mut *self.staged.write().await);
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let Some(owner_id) = owner.id() else {
            return Err(ValidationErrors::field(
                "id",
                "must be set before attachments can be persisted",
            )
            .into());
        };

        let mut replace_target = if self.save_action == SaveAction::Update {
            self.store
                .first_for_slot(O::ENTITY_TYPE, owner_id, &self.attribute)
                .await?
        } else {
            None
        };

        let mut saved = Vec::with_capacity(staged.len());
        for upload in staged {
            let record = match replace_target.take() {
                Some(existing) => self.replace_in_place(existing, &upload).await?,
                None => self.persist_new(owner_id, &upload).await?,
            };

            if upload.is_image() && !self.variants.is_empty() {
                self.generate_variants(&record, &upload).await?;
            }

            if let Some(record_id) = record.id {
                self.emit_completed(&UploadCompleted {
                    record_id,
                    entity: record.entity.clone(),
                    entity_id: record.entity_id,
                    attribute: record.entity_attribute.clone(),
                    storage_key: record.storage_key(),
                    completed_at: Utc::now(),
                });
            }
            saved.push(record);
        }

        info!(count = saved.len(), "Attachments persisted");
        Ok(saved)
    }

    /// Remove every attachment on the slot ahead of the owner's deletion.
    ///
    /// Not scenario gated: a disappearing owner never keeps its files.
    #[instrument(skip(self, owner), fields(slot = %self.attribute))]
    pub async fn before_delete(&self, owner: &O) -> LifecycleResult<usize> {
        let Some(owner_id) = owner.id() else {
            return Ok(0);
        };
        let records = self
            .store
            .get_for_slot(O::ENTITY_TYPE, owner_id, &self.attribute)
            .await?;
        let removed = self.delete_records(records).await?;
        if removed > 0 {
            info!(removed, "Attachments removed with owner");
        }
        Ok(removed)
    }

    /// All original attachments on the slot, ordered by `file_order`.
    pub async fn list_attachments(&self, owner: &O) -> LifecycleResult<Vec<FileRecord>> {
        let Some(owner_id) = owner.id() else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .get_for_slot(O::ENTITY_TYPE, owner_id, &self.attribute)
            .await?)
    }

    /// The slot's first original attachment, if any.
    pub async fn first_attachment(&self, owner: &O) -> LifecycleResult<Option<FileRecord>> {
        let Some(owner_id) = owner.id() else {
            return Ok(None);
        };
        Ok(self
            .store
            .first_for_slot(O::ENTITY_TYPE, owner_id, &self.attribute)
            .await?)
    }

    /// Delete the given attachments, or the whole slot when `records` is
    /// `None`. Variants cascade with their originals. Returns how many
    /// records were removed.
    pub async fn delete_attachments(
        &self,
        owner: &O,
        records: Option<Vec<FileRecord>>,
    ) -> LifecycleResult<usize> {
        let records = match records {
            Some(records) => records,
            None => self.list_attachments(owner).await?,
        };
        self.delete_records(records).await
    }

    /// All variants derived from an attachment.
    pub async fn variants(&self, attachment_id: Id) -> LifecycleResult<Vec<FileRecord>> {
        Ok(self.store.get_children(attachment_id).await?)
    }

    /// One named variant of an attachment.
    pub async fn variant(
        &self,
        attachment_id: Id,
        name: &str,
    ) -> LifecycleResult<Option<FileRecord>> {
        Ok(self.store.get_child(attachment_id, name).await?)
    }

    fn scenario_allows(&self, owner: &O) -> bool {
        self.scenarios.iter().any(|s| s == owner.scenario())
    }

    fn emit_completed(&self, event: &UploadCompleted) {
        for handler in &self.event_handlers {
            handler(event);
        }
    }

    async fn persist_new(&self, owner_id: Id, upload: &StagedUpload) -> LifecycleResult<FileRecord> {
        let mut record = FileRecord::for_upload(O::ENTITY_TYPE, owner_id, self.attribute.as_str());
        if let Some(user_id) = self.user_id {
            record = record.with_user(user_id);
        }
        record.resolve_paths(
            self.backend.base_path(),
            self.backend.public_url_prefix(),
            self.path_override.as_deref(),
        );
        record.apply_upload(upload);
        if upload.is_image() {
            record.apply_exif(extract_exif(&upload.data));
        }

        let staged = self.spool_upload(&mut record, upload).await?;
        self.store.create(&mut record).await?;
        self.backend
            .write_file(staged.path(), &record.storage_key())
            .await?;
        staged.cleanup().await?;

        debug!(record_id = ?record.id, key = %record.storage_key(), "Attachment persisted");
        Ok(record)
    }

    /// Refresh an existing row in place: its variants and old bytes go
    /// first, then the row is updated and the new bytes written under the
    /// same stored name.
    async fn replace_in_place(
        &self,
        existing: FileRecord,
        upload: &StagedUpload,
    ) -> LifecycleResult<FileRecord> {
        if let Some(parent_id) = existing.id {
            for child in self.store.get_children(parent_id).await? {
                self.backend.delete_file(&child.storage_key()).await?;
                if let Some(child_id) = child.id {
                    self.store.delete(child_id).await?;
                }
            }
        }
        // the old key may carry a different extension than the new bytes
        self.backend.delete_file(&existing.storage_key()).await?;

        let mut record = existing;
        record.apply_upload(upload);
        if upload.is_image() {
            record.apply_exif(extract_exif(&upload.data));
        }
        record.mark_updated();

        let staged = self.spool_upload(&mut record, upload).await?;
        self.store.update(&record).await?;
        self.backend
            .write_file(staged.path(), &record.storage_key())
            .await?;
        staged.cleanup().await?;

        debug!(record_id = ?record.id, key = %record.storage_key(), "Attachment replaced in place");
        Ok(record)
    }

    /// Spool the upload into a staging file, running the original's own
    /// transform steps when configured. `file_size` then follows the bytes
    /// that will actually be stored.
    async fn spool_upload(
        &self,
        record: &mut FileRecord,
        upload: &StagedUpload,
    ) -> LifecycleResult<StagedFile> {
        let source = stage_bytes(&upload.data, &upload.extension()).await?;
        match &self.original_profile {
            Some(profile) if upload.is_image() => {
                let output = profile.apply(self.transform.as_ref(), source.path()).await?;
                source.cleanup().await?;
                let metadata = tokio::fs::metadata(output.path())
                    .await
                    .map_err(StorageError::from)?;
                record.file_size = metadata.len() as i64;
                Ok(output)
            }
            _ => Ok(source),
        }
    }

    /// Build every configured variant from the staged original. The parent
    /// row is persisted by the time this runs.
    async fn generate_variants(
        &self,
        parent: &FileRecord,
        upload: &StagedUpload,
    ) -> LifecycleResult<Vec<FileRecord>> {
        let Some(parent_id) = parent.id else {
            return Ok(Vec::new());
        };

        let source = stage_bytes(&upload.data, &upload.extension()).await?;
        let mut children = Vec::with_capacity(self.variants.len());
        for (name, profile) in &self.variants {
            let output = profile.apply(self.transform.as_ref(), source.path()).await?;

            let mut child =
                FileRecord::for_upload(O::ENTITY_TYPE, parent.entity_id, self.attribute.as_str())
                    .as_variant(parent_id, name.as_str());
            if let Some(user_id) = self.user_id {
                child = child.with_user(user_id);
            }
            let path_override = profile
                .path
                .as_deref()
                .or(self.variant_path_override.as_deref())
                .or(self.path_override.as_deref());
            child.resolve_paths(
                self.backend.base_path(),
                self.backend.public_url_prefix(),
                path_override,
            );
            child.apply_upload(upload);
            let metadata = tokio::fs::metadata(output.path())
                .await
                .map_err(StorageError::from)?;
            child.file_size = metadata.len() as i64;

            self.store.create(&mut child).await?;
            self.backend
                .write_file(output.path(), &child.storage_key())
                .await?;
            output.cleanup().await?;

            debug!(variant = %name, record_id = ?child.id, "Variant persisted");
            children.push(child);
        }
        source.cleanup().await?;
        Ok(children)
    }

    /// Remove rows and their backend bytes, variants before originals.
    async fn delete_records(&self, records: Vec<FileRecord>) -> LifecycleResult<usize> {
        let mut removed = 0;
        for record in records {
            let Some(record_id) = record.id else {
                continue;
            };
            for child in self.store.get_children(record_id).await? {
                self.backend.delete_file(&child.storage_key()).await?;
                if let Some(child_id) = child.id {
                    self.store.delete(child_id).await?;
                }
                removed += 1;
            }
            self.backend.delete_file(&record.storage_key()).await?;
            self.store.delete(record_id).await?;
            removed += 1;
        }
        Ok(removed)
    }
}
