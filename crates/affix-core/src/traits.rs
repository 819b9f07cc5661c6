//! Core traits for owning records
//!
//! An owning record is the business entity an attachment belongs to. The
//! lifecycle controller only needs its type name, primary key, and the
//! scenario label of the operation currently running on it.

/// Primary key type
pub type Id = i64;

/// Trait for entities that have a primary key
pub trait Identifiable {
    fn id(&self) -> Option<Id>;

    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

/// The scenario an owner runs under when none is set explicitly
pub const DEFAULT_SCENARIO: &str = "default";

/// Trait for records that can own attachments
///
/// `ENTITY_TYPE` is the short type name persisted into the `entity` column
/// and used as the first segment of derived storage paths.
pub trait OwningRecord: Identifiable {
    const ENTITY_TYPE: &'static str;

    /// Label of the operation currently running on this record, used for
    /// scenario gating. Most callers keep the default.
    fn scenario(&self) -> &str {
        DEFAULT_SCENARIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Post {
        id: Option<Id>,
    }

    impl Identifiable for Post {
        fn id(&self) -> Option<Id> {
            self.id
        }
    }

    impl OwningRecord for Post {
        const ENTITY_TYPE: &'static str = "Post";
    }

    #[test]
    fn test_new_record() {
        let post = Post { id: None };
        assert!(post.is_new_record());
        assert!(!post.is_persisted());
    }

    #[test]
    fn test_persisted_record() {
        let post = Post { id: Some(42) };
        assert!(post.is_persisted());
        assert_eq!(post.id(), Some(42));
        assert_eq!(post.scenario(), DEFAULT_SCENARIO);
    }
}
