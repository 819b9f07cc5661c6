//! PostgreSQL record store
//!
//! Sibling order assignment races with concurrent inserts into the same
//! group, so `create` computes `max + 1`, inserts, and retries a bounded
//! number of times when the unique index on
//! (entity, entity_id, entity_attribute, parent_id, file_order) rejects the
//! row.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use affix_core::Id;

use crate::model::FileRecord;
use crate::store::{RecordError, RecordResult, RecordStore};

const ORDER_INSERT_ATTEMPTS: u32 = 3;

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Record store backed by the `file_uploads` table
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &FileRecord) -> Result<Id, sqlx::Error> {
        sqlx::query_scalar::<_, Id>(
            r#"
            INSERT INTO file_uploads (
                entity, entity_id, entity_attribute, parent_id, child_name,
                upload_date, file_order, relative_path, complete_path, web_path,
                original_file_name, file_name, mime_type, extension, file_size,
                exif, user_id, updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(&record.entity)
        .bind(record.entity_id)
        .bind(&record.entity_attribute)
        .bind(record.parent_id)
        .bind(&record.child_name)
        .bind(record.upload_date)
        .bind(record.file_order)
        .bind(&record.relative_path)
        .bind(&record.complete_path)
        .bind(&record.web_path)
        .bind(&record.original_file_name)
        .bind(&record.file_name)
        .bind(&record.mime_type)
        .bind(&record.extension)
        .bind(record.file_size)
        .bind(&record.exif)
        .bind(record.user_id)
        .bind(record.updated)
        .fetch_one(&self.pool)
        .await
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create(&self, record: &mut FileRecord) -> RecordResult<Id> {
        let preset_order = record.file_order != 0;

        for attempt in 1..=ORDER_INSERT_ATTEMPTS {
            if !preset_order || attempt > 1 {
                record.file_order = self
                    .next_order(
                        &record.entity,
                        record.entity_id,
                        &record.entity_attribute,
                        record.parent_id,
                    )
                    .await?;
            }

            match self.insert(record).await {
                Ok(id) => {
                    record.id = Some(id);
                    return Ok(id);
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(
                        attempt,
                        file_order = record.file_order,
                        "Sibling order already taken, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RecordError::Conflict(format!(
            "sibling order contention persisted across {} attempts",
            ORDER_INSERT_ATTEMPTS
        )))
    }

    async fn get(&self, id: Id) -> RecordResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, entity, entity_id, entity_attribute, parent_id, child_name,
                   upload_date, file_order, relative_path, complete_path, web_path,
                   original_file_name, file_name, mime_type, extension, file_size,
                   exif, user_id, updated
            FROM file_uploads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update(&self, record: &FileRecord) -> RecordResult<()> {
        let Some(id) = record.id else {
            return Err(RecordError::Unsaved);
        };

        sqlx::query(
            r#"
            UPDATE file_uploads
            SET entity = $2, entity_id = $3, entity_attribute = $4, parent_id = $5,
                child_name = $6, upload_date = $7, file_order = $8,
                relative_path = $9, complete_path = $10, web_path = $11,
                original_file_name = $12, file_name = $13, mime_type = $14,
                extension = $15, file_size = $16, exif = $17, user_id = $18,
                updated = $19
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&record.entity)
        .bind(record.entity_id)
        .bind(&record.entity_attribute)
        .bind(record.parent_id)
        .bind(&record.child_name)
        .bind(record.upload_date)
        .bind(record.file_order)
        .bind(&record.relative_path)
        .bind(&record.complete_path)
        .bind(&record.web_path)
        .bind(&record.original_file_name)
        .bind(&record.file_name)
        .bind(&record.mime_type)
        .bind(&record.extension)
        .bind(record.file_size)
        .bind(&record.exif)
        .bind(record.user_id)
        .bind(record.updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Id) -> RecordResult<()> {
        sqlx::query("DELETE FROM file_uploads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, entity, entity_id, entity_attribute, parent_id, child_name,
                   upload_date, file_order, relative_path, complete_path, web_path,
                   original_file_name, file_name, mime_type, extension, file_size,
                   exif, user_id, updated
            FROM file_uploads
            WHERE entity = $1 AND entity_id = $2 AND entity_attribute = $3
              AND parent_id = 0
            ORDER BY file_order ASC
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .bind(attribute)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn first_for_slot(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
    ) -> RecordResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, entity, entity_id, entity_attribute, parent_id, child_name,
                   upload_date, file_order, relative_path, complete_path, web_path,
                   original_file_name, file_name, mime_type, extension, file_size,
                   exif, user_id, updated
            FROM file_uploads
            WHERE entity = $1 AND entity_id = $2 AND entity_attribute = $3
              AND parent_id = 0
            ORDER BY file_order ASC
            LIMIT 1
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .bind(attribute)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_children(&self, parent_id: Id) -> RecordResult<Vec<FileRecord>> {
        if parent_id == 0 {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, entity, entity_id, entity_attribute, parent_id, child_name,
                   upload_date, file_order, relative_path, complete_path, web_path,
                   original_file_name, file_name, mime_type, extension, file_size,
                   exif, user_id, updated
            FROM file_uploads
            WHERE parent_id = $1
            ORDER BY file_order ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_child(
        &self,
        parent_id: Id,
        child_name: &str,
    ) -> RecordResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, entity, entity_id, entity_attribute, parent_id, child_name,
                   upload_date, file_order, relative_path, complete_path, web_path,
                   original_file_name, file_name, mime_type, extension, file_size,
                   exif, user_id, updated
            FROM file_uploads
            WHERE parent_id = $1 AND child_name = $2
            "#,
        )
        .bind(parent_id)
        .bind(child_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn next_order(
        &self,
        entity: &str,
        entity_id: Id,
        attribute: &str,
        parent_id: Id,
    ) -> RecordResult<i32> {
        let next = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT COALESCE(MAX(file_order), 0) + 1
            FROM file_uploads
            WHERE entity = $1 AND entity_id = $2 AND entity_attribute = $3
              AND parent_id = $4
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .bind(attribute)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }
}
