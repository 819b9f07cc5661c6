//! Attachment metadata record
//!
//! A `FileRecord` is one row of the `file_uploads` table: either an original
//! upload (`parent_id = 0`) or a derived variant pointing at its original.
//! The record computes and freezes its own storage coordinates; content
//! describing fields refresh whenever the underlying bytes change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use affix_core::{Id, StagedUpload};

/// Derived persistence state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Constructed, no storage coordinates assigned yet
    Pending,
    /// Path fields and generated file name assigned
    PathResolved,
    /// Backed by a database row
    Persisted,
    /// Row and backend bytes removed
    Deleted,
}

/// One attachment metadata row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    /// Row ID, assigned by the store
    pub id: Option<Id>,
    /// Short type name of the owning record
    pub entity: String,
    /// Primary key of the owning record
    pub entity_id: Id,
    /// Logical slot name on the owner (e.g. "avatar")
    pub entity_attribute: String,
    /// 0 for an original; the original's id for a variant
    pub parent_id: Id,
    /// Label distinguishing sibling variants (e.g. "thumb")
    pub child_name: Option<String>,
    /// When the upload was first recorded
    pub upload_date: DateTime<Utc>,
    /// Rank among siblings sharing (entity, entity_id, attribute, parent_id)
    pub file_order: i32,
    /// Storage directory relative to the backend base, trailing slash
    pub relative_path: String,
    /// Backend base path plus the relative path
    pub complete_path: String,
    /// Public URL prefix plus the relative path
    pub web_path: String,
    /// Client-supplied base name, without extension
    pub original_file_name: String,
    /// Generated collision-resistant stored name, without extension
    pub file_name: String,
    /// MIME type of the current bytes
    pub mime_type: String,
    /// Lowercased extension of the current bytes
    pub extension: String,
    /// Size of the current bytes
    pub file_size: i64,
    /// JSON-encoded EXIF blob, written once and never overwritten
    pub exif: Option<String>,
    /// Creator user id, when the slot is configured with one
    pub user_id: Option<Id>,
    /// Set once the row's bytes have been replaced in place
    pub updated: bool,

    #[serde(skip)]
    #[sqlx(default)]
    deleted: bool,
}

impl FileRecord {
    /// Creates a pending record for an upload on an owner slot.
    pub fn for_upload(
        entity: impl Into<String>,
        entity_id: Id,
        entity_attribute: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            entity: entity.into(),
            entity_id,
            entity_attribute: entity_attribute.into(),
            parent_id: 0,
            child_name: None,
            upload_date: Utc::now(),
            file_order: 0,
            relative_path: String::new(),
            complete_path: String::new(),
            web_path: String::new(),
            original_file_name: String::new(),
            file_name: String::new(),
            mime_type: String::new(),
            extension: String::new(),
            file_size: 0,
            exif: None,
            user_id: None,
            updated: false,
            deleted: false,
        }
    }

    /// Turns this record into a variant of a persisted original.
    pub fn as_variant(mut self, parent_id: Id, child_name: impl Into<String>) -> Self {
        self.parent_id = parent_id;
        self.child_name = Some(child_name.into());
        self
    }

    /// Sets the creator user id.
    pub fn with_user(mut self, user_id: Id) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Assigns the location fields and the generated stored name.
    ///
    /// Runs exactly once per record: a record that already carries a stored
    /// name keeps all its location fields, no matter what is passed later.
    /// Without an override the directory is derived from the owning type and
    /// the upload date (`Entity/YYYY/MM/DD/`); an override is normalized to
    /// exactly one trailing slash.
    pub fn resolve_paths(
        &mut self,
        base_path: &str,
        public_url_prefix: &str,
        path_override: Option<&str>,
    ) {
        if !self.file_name.is_empty() {
            return;
        }

        let relative = match path_override {
            Some(path) => format!("{}/", path.trim_matches('/')),
            None => format!(
                "{}/{}/",
                self.entity,
                self.upload_date.format("%Y/%m/%d")
            ),
        };
        self.complete_path = format!("{}{}", base_path, relative);
        self.web_path = format!("{}{}", public_url_prefix, relative);
        self.relative_path = relative;
        self.file_name = Uuid::new_v4().simple().to_string();
    }

    /// Refreshes the content-describing fields from a staged upload.
    ///
    /// The client base name is kept from the first upload; mime type,
    /// extension and size always follow the current bytes.
    pub fn apply_upload(&mut self, upload: &StagedUpload) {
        self.mime_type = upload.mime_type();
        self.extension = upload.extension();
        self.file_size = upload.size();
        if self.original_file_name.is_empty() {
            self.original_file_name = upload.base_name();
        }
    }

    /// Records an extracted EXIF blob unless one is already present.
    pub fn apply_exif(&mut self, blob: Option<String>) {
        if self.exif.as_deref().map_or(true, |e| e.is_empty()) {
            self.exif = blob;
        }
    }

    /// Marks the row as having had its bytes replaced in place.
    pub fn mark_updated(&mut self) {
        self.updated = true;
    }

    /// Marks the record as removed from both store and backend.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Derived persistence state.
    pub fn state(&self) -> RecordState {
        if self.deleted {
            RecordState::Deleted
        } else if self.id.is_some() {
            RecordState::Persisted
        } else if !self.file_name.is_empty() {
            RecordState::PathResolved
        } else {
            RecordState::Pending
        }
    }

    /// Check if this is a top-level attachment
    pub fn is_original(&self) -> bool {
        self.parent_id == 0
    }

    /// Check if this is a derived file
    pub fn is_variant(&self) -> bool {
        !self.is_original()
    }

    /// Check if the current bytes are an image
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Backend key the physical bytes live under.
    pub fn storage_key(&self) -> String {
        if self.extension.is_empty() {
            format!("{}{}", self.relative_path, self.file_name)
        } else {
            format!("{}{}.{}", self.relative_path, self.file_name, self.extension)
        }
    }

    /// Public URL of the stored file.
    pub fn public_url(&self) -> String {
        if self.extension.is_empty() {
            format!("{}{}", self.web_path, self.file_name)
        } else {
            format!("{}{}.{}", self.web_path, self.file_name, self.extension)
        }
    }

    /// Human-readable file size
    pub fn human_file_size(&self) -> String {
        let size = self.file_size as f64;
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

        if size == 0.0 {
            return "0 B".to_string();
        }

        let base = 1024.0_f64;
        let i = (size.ln() / base.ln()).floor() as usize;
        let i = i.min(UNITS.len() - 1);

        let value = size / base.powi(i as i32);
        format!("{:.1} {}", value, UNITS[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn create_record() -> FileRecord {
        FileRecord::for_upload("User", 7, "avatar")
    }

    #[test]
    fn test_state_progression() {
        let mut record = create_record();
        assert_eq!(record.state(), RecordState::Pending);

        record.resolve_paths("uploads/", "/uploads/", None);
        assert_eq!(record.state(), RecordState::PathResolved);

        record.id = Some(1);
        assert_eq!(record.state(), RecordState::Persisted);

        record.mark_deleted();
        assert_eq!(record.state(), RecordState::Deleted);
    }

    #[test]
    fn test_resolve_paths_derives_date_directory() {
        let mut record = create_record();
        record.resolve_paths("uploads/", "/uploads/", None);

        let expected = format!("User/{}/", record.upload_date.format("%Y/%m/%d"));
        assert_eq!(record.relative_path, expected);
        assert_eq!(record.complete_path, format!("uploads/{}", expected));
        assert_eq!(record.web_path, format!("/uploads/{}", expected));
        assert!(!record.file_name.is_empty());
        assert_eq!(record.file_name.len(), 32);
    }

    #[test]
    fn test_resolve_paths_normalizes_override() {
        let mut record = create_record();
        record.resolve_paths("uploads/", "/uploads/", Some("custom/dir"));
        assert_eq!(record.relative_path, "custom/dir/");

        let mut record = create_record();
        record.resolve_paths("uploads/", "/uploads/", Some("/custom/dir/"));
        assert_eq!(record.relative_path, "custom/dir/");
    }

    #[test]
    fn test_resolve_paths_runs_once() {
        let mut record = create_record();
        record.resolve_paths("uploads/", "/uploads/", Some("first"));
        let name = record.file_name.clone();

        record.resolve_paths("elsewhere/", "/elsewhere/", Some("second"));
        assert_eq!(record.relative_path, "first/");
        assert_eq!(record.file_name, name);
    }

    #[test]
    fn test_apply_upload_refreshes_content_fields() {
        let mut record = create_record();
        let upload = StagedUpload::new("cat.png", Bytes::from(vec![0u8; 2048]));
        record.apply_upload(&upload);

        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.extension, "png");
        assert_eq!(record.file_size, 2048);
        assert_eq!(record.original_file_name, "cat");

        let replacement = StagedUpload::new("dog.jpg", Bytes::from(vec![0u8; 100]));
        record.apply_upload(&replacement);

        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.extension, "jpg");
        assert_eq!(record.file_size, 100);
        // Client base name is frozen by the first upload.
        assert_eq!(record.original_file_name, "cat");
    }

    #[test]
    fn test_apply_exif_never_overwrites() {
        let mut record = create_record();
        record.apply_exif(Some("{\"Model\":\"X100\"}".to_string()));
        assert_eq!(record.exif.as_deref(), Some("{\"Model\":\"X100\"}"));

        record.apply_exif(Some("{\"Model\":\"other\"}".to_string()));
        assert_eq!(record.exif.as_deref(), Some("{\"Model\":\"X100\"}"));
    }

    #[test]
    fn test_storage_key_and_public_url() {
        let mut record = create_record();
        record.resolve_paths("uploads/", "/img/", Some("avatars"));
        record.apply_upload(&StagedUpload::new("cat.png", Bytes::from_static(b"x")));

        assert_eq!(
            record.storage_key(),
            format!("avatars/{}.png", record.file_name)
        );
        assert_eq!(
            record.public_url(),
            format!("/img/avatars/{}.png", record.file_name)
        );
    }

    #[test]
    fn test_storage_key_without_extension() {
        let mut record = create_record();
        record.resolve_paths("uploads/", "/img/", Some("raw"));
        record.apply_upload(&StagedUpload::new("README", Bytes::from_static(b"x")));

        assert_eq!(record.storage_key(), format!("raw/{}", record.file_name));
    }

    #[test]
    fn test_variant_builder() {
        let record = create_record().as_variant(42, "thumb").with_user(9);

        assert!(record.is_variant());
        assert_eq!(record.parent_id, 42);
        assert_eq!(record.child_name.as_deref(), Some("thumb"));
        assert_eq!(record.user_id, Some(9));
    }

    #[test]
    fn test_human_file_size() {
        let mut record = create_record();
        record.file_size = 1536;
        assert_eq!(record.human_file_size(), "1.5 KB");

        record.file_size = 0;
        assert_eq!(record.human_file_size(), "0 B");
    }
}
