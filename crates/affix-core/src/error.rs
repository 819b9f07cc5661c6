//! Core error types for Affix
//!
//! Configuration errors are raised at bind time and are always fatal;
//! validation errors are raised before any storage or database I/O.

use std::collections::HashMap;
use thiserror::Error;

/// Configuration error raised when a slot is bound
///
/// These are programming errors: a controller must never be built with a
/// missing slot attribute, an unresolvable backend, or a variant profile
/// whose dimensions are both zero.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The slot attribute must be set")]
    MissingAttribute,

    #[error("No read accessor bound for slot '{slot}'")]
    MissingReadAccessor { slot: String },

    #[error("No storage backend bound for slot '{slot}'")]
    UnboundBackend { slot: String },

    #[error("Unknown storage backend '{name}' for slot '{slot}'")]
    UnknownBackend { slot: String, name: String },

    #[error("Invalid save action '{0}'")]
    InvalidSaveAction(String),

    #[error(
        "Length of either side of variant '{profile}' cannot be zero, current size is {width}x{height}"
    )]
    InvalidVariantDimensions {
        profile: String,
        width: u32,
        height: u32,
    },
}

/// Validation errors collection
#[derive(Error, Debug, Default, Clone)]
#[error("Validation errors: {errors:?}")]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: HashMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single field error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_add() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("entity_id", "must be set");
        assert!(!errors.is_empty());
        assert!(errors.has_error("entity_id"));
        assert!(!errors.has_error("file_name"));
    }

    #[test]
    fn test_validation_errors_full_messages() {
        let mut errors = ValidationErrors::new();
        errors.add_base("no upload staged");
        errors.add("entity_id", "must be set");

        let messages = errors.full_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.contains(&"no upload staged".to_string()));
        assert!(messages.contains(&"entity_id must be set".to_string()));
    }

    #[test]
    fn test_validation_errors_merge() {
        let mut a = ValidationErrors::field("entity_id", "must be set");
        let b = ValidationErrors::field("entity_id", "must be positive");
        a.merge(b);

        assert_eq!(a.errors.get("entity_id").map(Vec::len), Some(2));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidVariantDimensions {
            profile: "thumb".to_string(),
            width: 0,
            height: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("thumb"));
        assert!(msg.contains("0x0"));
    }
}
