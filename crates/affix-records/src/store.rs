//! Record store boundary
//!
//! The lifecycle controller persists metadata through this trait. Sibling
//! order assignment lives inside `create`: a record arriving with
//! `file_order = 0` gets `max(file_order) + 1` within its sibling group
//! (entity, entity_id, entity_attribute, parent_id). Orders are never reused
//! and never renumbered on delete.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use affix_core::Id;

use crate::model::FileRecord;

/// Store errors
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record not found: {0}")]
    NotFound(Id),

    #[error("Record has not been created yet")]
    Unsaved,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for store operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Attachment metadata store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record, assigning its id and (when unset) its sibling order
    async fn create(&self, record: &mut FileRecord) -> RecordResult<Id>;

    /// Get a record by id
    async fn get(&self, id: Id) -> RecordResult<Option<FileRecord>>;

    /// Persist the current field values of an existing record
    async fn update(&self, record: &FileRecord) -> RecordResult<()>;

    /// Delete a record row. Deleting an absent row is not an error.
    async fn delete(&self, id: Id) -> RecordResult<()>;

    /// Originals for an owner slot, ordered by file_order ascending
    async fn get_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Vec<FileRecord>>;

    /// First original for an owner slot (minimum file_order)
    async fn first_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Option<FileRecord>>;

    /// Variants of an original, ordered by file_order ascending
    async fn get_children(&self, parent_id: Id) -> RecordResult<Vec<FileRecord>>;

    /// Variant of an original by its child name
    async fn get_child(&self, parent_id: Id, child_name: &str)
        -> RecordResult<Option<FileRecord>>;

    /// Next free sibling order within a group
    async fn next_order(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
        parent_id: Id,
    ) -> RecordResult<i32>;
}

fn next_order_in(
    records: &[FileRecord],
    entity: &str,
    entity_id: Id,
    attribute: &str,
    parent_id: Id,
) -> i32 {
    records
        .iter()
        .filter(|r| {
            r.entity == entity
                && r.entity_id == entity_id
                && r.entity_attribute == attribute
                && r.parent_id == parent_id
        })
        .map(|r| r.file_order)
        .max()
        .unwrap_or(0)
        + 1
}

/// In-memory record store for testing
pub struct MemoryRecordStore {
    records: RwLock<Vec<FileRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of rows currently held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &mut FileRecord) -> RecordResult<Id> {
        let mut records = self.records.write().await;

        if record.file_order == 0 {
            record.file_order = next_order_in(
                &records,
                &record.entity,
                record.entity_id,
                &record.entity_attribute,
                record.parent_id,
            );
        } else if records.iter().any(|r| {
            r.entity == record.entity
                && r.entity_id == record.entity_id
                && r.entity_attribute == record.entity_attribute
                && r.parent_id == record.parent_id
                && r.file_order == record.file_order
        }) {
            return Err(RecordError::Conflict(format!(
                "file_order {} already taken in its sibling group",
                record.file_order
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = Some(id);
        records.push(record.clone());

        Ok(id)
    }

    async fn get(&self, id: Id) -> RecordResult<Option<FileRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == Some(id)).cloned())
    }

    async fn update(&self, record: &FileRecord) -> RecordResult<()> {
        if record.id.is_none() {
            return Err(RecordError::Unsaved);
        }
        let mut records = self.records.write().await;
        if let Some(pos) = records.iter().position(|r| r.id == record.id) {
            records[pos] = record.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: Id) -> RecordResult<()> {
        let mut records = self.records.write().await;
        records.retain(|r| r.id != Some(id));
        Ok(())
    }

    async fn get_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Vec<FileRecord>> {
        let records = self.records.read().await;
        let mut matches: Vec<FileRecord> = records
            .iter()
            .filter(|r| {
                r.entity == entity
                    && r.entity_id == entity_id
                    && r.entity_attribute == attribute
                    && r.is_original()
            })
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.file_order);
        Ok(matches)
    }

    async fn first_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Option<FileRecord>> {
        Ok(self
            .get_for_slot(entity, entity_id, attribute)
            .await?
            .into_iter()
            .next())
    }

    async fn get_children(&self, parent_id: Id) -> RecordResult<Vec<FileRecord>> {
        // parent_id 0 marks originals, not a real parent
        if parent_id == 0 {
            return Ok(Vec::new());
        }
        let records = self.records.read().await;
        let mut children: Vec<FileRecord> = records
            .iter()
            .filter(|r| r.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|r| r.file_order);
        Ok(children)
    }

    async fn get_child(
        &self,
        parent_id: Id,
        child_name: &str,
    ) -> RecordResult<Option<FileRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.parent_id == parent_id && r.child_name.as_deref() == Some(child_name))
            .cloned())
    }

    async fn next_order(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
        parent_id: Id,
    ) -> RecordResult<i32> {
        let records = self.records.read().await;
        Ok(next_order_in(&records, entity, entity_id, attribute, parent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_record(entity_id: Id) -> FileRecord {
        FileRecord::for_upload("User", entity_id, "avatar")
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_order() {
        let store = MemoryRecordStore::new();

        let mut first = create_record(7);
        let mut second = create_record(7);
        store.create(&mut first).await.unwrap();
        store.create(&mut second).await.unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(first.file_order, 1);
        assert_eq!(second.file_order, 2);
    }

    #[tokio::test]
    async fn test_orders_are_scoped_per_owner() {
        let store = MemoryRecordStore::new();

        let mut mine = create_record(7);
        let mut theirs = create_record(8);
        store.create(&mut mine).await.unwrap();
        store.create(&mut theirs).await.unwrap();

        assert_eq!(mine.file_order, 1);
        assert_eq!(theirs.file_order, 1);
    }

    #[tokio::test]
    async fn test_delete_does_not_renumber() {
        let store = MemoryRecordStore::new();

        let mut a = create_record(7);
        let mut b = create_record(7);
        store.create(&mut a).await.unwrap();
        store.create(&mut b).await.unwrap();

        store.delete(a.id.unwrap()).await.unwrap();

        let mut c = create_record(7);
        store.create(&mut c).await.unwrap();
        assert_eq!(c.file_order, 3);

        let remaining = store.get_for_slot("User", 7, "avatar").await.unwrap();
        let orders: Vec<i32> = remaining.iter().map(|r| r.file_order).collect();
        assert_eq!(orders, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_duplicate_preset_order_conflicts() {
        let store = MemoryRecordStore::new();

        let mut a = create_record(7);
        store.create(&mut a).await.unwrap();

        let mut clash = create_record(7);
        clash.file_order = a.file_order;
        let result = store.create(&mut clash).await;

        assert!(matches!(result, Err(RecordError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_slot_queries_exclude_variants() {
        let store = MemoryRecordStore::new();

        let mut original = create_record(7);
        store.create(&mut original).await.unwrap();
        let parent_id = original.id.unwrap();

        let mut thumb = create_record(7).as_variant(parent_id, "thumb");
        let mut preview = create_record(7).as_variant(parent_id, "preview");
        store.create(&mut thumb).await.unwrap();
        store.create(&mut preview).await.unwrap();

        let originals = store.get_for_slot("User", 7, "avatar").await.unwrap();
        assert_eq!(originals.len(), 1);

        let children = store.get_children(parent_id).await.unwrap();
        assert_eq!(children.len(), 2);
        // Variants order within their own group, independent of the parent.
        assert_eq!(children[0].file_order, 1);
        assert_eq!(children[1].file_order, 2);

        let named = store.get_child(parent_id, "preview").await.unwrap().unwrap();
        assert_eq!(named.child_name.as_deref(), Some("preview"));
    }

    #[tokio::test]
    async fn test_update_replaces_row() {
        let store = MemoryRecordStore::new();

        let mut record = create_record(7);
        store.create(&mut record).await.unwrap();

        record.mime_type = "image/png".to_string();
        record.mark_updated();
        store.update(&record).await.unwrap();

        let reloaded = store.get(record.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(reloaded.mime_type, "image/png");
        assert!(reloaded.updated);
    }
}
