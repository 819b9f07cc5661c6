//! Lifecycle events
//!
//! Emitted after an attachment and its variants have been fully persisted,
//! so hosts can hook cache invalidation, notifications or search indexing.

use affix_core::Id;
use chrono::{DateTime, Utc};

/// Emitted once per original attachment persisted during an owner save.
#[derive(Debug, Clone)]
pub struct UploadCompleted {
    /// Id of the persisted attachment record.
    pub record_id: Id,
    /// Owning entity type, e.g. "User".
    pub entity: String,
    /// Owning entity primary key.
    pub entity_id: Id,
    /// Slot attribute the upload was staged on.
    pub attribute: String,
    /// Backend key the bytes were written under.
    pub storage_key: String,
    /// When the record was persisted.
    pub completed_at: DateTime<Utc>,
}
