//! Attachment metadata records for Affix.
//!
//! One `file_uploads` row per stored file: originals carry `parent_id = 0`,
//! derived variants point at their original. The record type owns path and
//! name derivation; the [`RecordStore`] trait is the persistence seam, with
//! a Postgres implementation and an in-memory one for tests.
//!
//! # Features
//!
//! - **`FileRecord`** with one-shot location resolution and refresh rules
//!   for the content-describing fields
//! - **Sibling ordering**: `file_order` assigned as max+1 within
//!   (entity, entity_id, entity_attribute, parent_id), protected in Postgres
//!   by a unique index plus bounded insert retry
//! - **Schema bootstrap** for hosts without their own migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use affix_records::{Database, DatabaseConfig, PgRecordStore, RecordStore};
//!
//! let db = Database::connect(&DatabaseConfig::from_env()).await?;
//! affix_records::ensure_schema(db.pool()).await?;
//!
//! let store = PgRecordStore::new(db.pool().clone());
//! let avatars = store.get_for_slot("User", 7, "avatar").await?;
//! ```

pub mod model;
pub mod pg;
pub mod pool;
pub mod schema;
pub mod store;

pub use model::{FileRecord, RecordState};
pub use pg::PgRecordStore;
pub use pool::{Database, DatabaseConfig};
pub use schema::ensure_schema;
pub use store::{MemoryRecordStore, RecordError, RecordResult, RecordStore};
