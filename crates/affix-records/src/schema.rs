//! Schema bootstrap for the `file_uploads` table
//!
//! Hosts that manage their own migrations can lift the statements below;
//! everyone else calls [`ensure_schema`] at startup. Every statement is
//! idempotent.

use sqlx::PgPool;
use tracing::info;

pub const CREATE_FILE_UPLOADS: &str = r#"
CREATE TABLE IF NOT EXISTS file_uploads (
    id                 BIGSERIAL PRIMARY KEY,
    entity             TEXT NOT NULL,
    entity_id          BIGINT NOT NULL,
    entity_attribute   TEXT NOT NULL,
    parent_id          BIGINT NOT NULL DEFAULT 0,
    child_name         TEXT,
    upload_date        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    file_order         INTEGER NOT NULL DEFAULT 0,
    relative_path      TEXT NOT NULL DEFAULT '',
    complete_path      TEXT NOT NULL DEFAULT '',
    web_path           TEXT NOT NULL DEFAULT '',
    original_file_name TEXT NOT NULL DEFAULT '',
    file_name          TEXT NOT NULL DEFAULT '',
    mime_type          TEXT NOT NULL DEFAULT '',
    extension          TEXT NOT NULL DEFAULT '',
    file_size          BIGINT NOT NULL DEFAULT 0,
    exif               TEXT,
    user_id            BIGINT,
    updated            BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS file_upload_entity ON file_uploads (entity)",
    "CREATE INDEX IF NOT EXISTS file_upload_entity_attribute ON file_uploads (entity_attribute)",
    "CREATE INDEX IF NOT EXISTS file_upload_entity_attribute_complex ON file_uploads (entity, entity_attribute)",
    "CREATE INDEX IF NOT EXISTS file_upload_child_name ON file_uploads (child_name)",
    "CREATE INDEX IF NOT EXISTS file_upload_user_id ON file_uploads (user_id)",
    "CREATE INDEX IF NOT EXISTS file_upload_all_entities ON file_uploads (entity, entity_id, entity_attribute)",
    "CREATE UNIQUE INDEX IF NOT EXISTS file_upload_sibling_order ON file_uploads (entity, entity_id, entity_attribute, parent_id, file_order)",
];

/// Create the table and its indexes when they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_FILE_UPLOADS).execute(pool).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("file_uploads schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_target_the_uploads_table() {
        assert!(CREATE_FILE_UPLOADS.contains("file_uploads"));
        assert_eq!(CREATE_INDEXES.len(), 7);
        for statement in CREATE_INDEXES {
            assert!(statement.contains("ON file_uploads"));
        }
    }

    #[test]
    fn test_sibling_order_index_is_unique() {
        let sibling = CREATE_INDEXES
            .iter()
            .find(|s| s.contains("file_upload_sibling_order"))
            .unwrap();
        assert!(sibling.contains("UNIQUE"));
        assert!(sibling.contains("file_order"));
    }
}
