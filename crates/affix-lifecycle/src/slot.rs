//! Slot bindings between an owning record and its staged uploads
//!
//! A slot is one attachment-bearing attribute on an owning record, for
//! example `avatar` on a user. The controller reads staged uploads out of
//! the owner through a [`SlotReader`] and writes resolved uploads back
//! through a [`SlotWriter`], so the owner type stays free of any
//! attachment-specific fields.

use affix_core::StagedUpload;
use serde::{Deserialize, Serialize};

/// Owner scenarios in which uploads are staged when none are configured.
pub const DEFAULT_SCENARIOS: &[&str] = &["default", "insert", "update", "delete"];

/// What to do with existing attachments when the owner is saved again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    /// Keep existing attachments and append the staged uploads.
    #[default]
    Insert,
    /// Replace the first existing attachment in place, append the rest.
    Update,
    /// Delete all existing attachments before persisting the staged uploads.
    Delete,
}

impl SaveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveAction::Insert => "insert",
            SaveAction::Update => "update",
            SaveAction::Delete => "delete",
        }
    }

    /// Parse a configuration string, case-insensitively.
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "insert" => Some(SaveAction::Insert),
            "update" => Some(SaveAction::Update),
            "delete" => Some(SaveAction::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for SaveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current value of an attachment slot on the owning record.
#[derive(Debug, Clone, Default)]
pub enum SlotValue {
    /// Nothing staged.
    #[default]
    Empty,
    /// A single staged upload.
    Single(StagedUpload),
    /// Several staged uploads, persisted in order.
    Many(Vec<StagedUpload>),
}

impl SlotValue {
    pub fn is_empty(&self) -> bool {
        match self {
            SlotValue::Empty => true,
            SlotValue::Single(_) => false,
            SlotValue::Many(list) => list.is_empty(),
        }
    }

    /// Flatten into the list of uploads to persist.
    pub fn uploads(self) -> Vec<StagedUpload> {
        match self {
            SlotValue::Empty => Vec::new(),
            SlotValue::Single(upload) => vec![upload],
            SlotValue::Many(list) => list,
        }
    }
}

impl From<StagedUpload> for SlotValue {
    fn from(upload: StagedUpload) -> Self {
        SlotValue::Single(upload)
    }
}

impl From<Vec<StagedUpload>> for SlotValue {
    fn from(uploads: Vec<StagedUpload>) -> Self {
        SlotValue::Many(uploads)
    }
}

/// Reads the slot value off an owning record.
pub type SlotReader<O> = Box<dyn Fn(&O) -> SlotValue + Send + Sync>;

/// Writes a resolved slot value back onto an owning record.
pub type SlotWriter<O> = Box<dyn Fn(&mut O, SlotValue) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_save_action_parse() {
        assert_eq!(SaveAction::from_str("insert"), Some(SaveAction::Insert));
        assert_eq!(SaveAction::from_str("UPDATE"), Some(SaveAction::Update));
        assert_eq!(SaveAction::from_str("Delete"), Some(SaveAction::Delete));
        assert_eq!(SaveAction::from_str("replace"), None);
    }

    #[test]
    fn test_save_action_display_round_trip() {
        for action in [SaveAction::Insert, SaveAction::Update, SaveAction::Delete] {
            assert_eq!(SaveAction::from_str(&action.to_string()), Some(action));
        }
    }

    #[test]
    fn test_save_action_default_is_insert() {
        assert_eq!(SaveAction::default(), SaveAction::Insert);
    }

    #[test]
    fn test_slot_value_flatten() {
        let upload = StagedUpload::new("cat.png", Bytes::from_static(b"png"));

        assert!(SlotValue::Empty.uploads().is_empty());
        assert_eq!(SlotValue::Single(upload.clone()).uploads().len(), 1);
        assert_eq!(
            SlotValue::Many(vec![upload.clone(), upload]).uploads().len(),
            2
        );
    }

    #[test]
    fn test_slot_value_is_empty() {
        assert!(SlotValue::Empty.is_empty());
        assert!(SlotValue::Many(Vec::new()).is_empty());

        let upload = StagedUpload::new("cat.png", Bytes::from_static(b"png"));
        assert!(!SlotValue::from(upload).is_empty());
    }

    #[test]
    fn test_default_scenarios_cover_crud() {
        assert!(DEFAULT_SCENARIOS.contains(&"default"));
        assert!(DEFAULT_SCENARIOS.contains(&"insert"));
        assert!(DEFAULT_SCENARIOS.contains(&"update"));
        assert!(DEFAULT_SCENARIOS.contains(&"delete"));
    }
}
