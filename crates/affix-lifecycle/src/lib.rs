//! Attachment lifecycle controller for Affix.
//!
//! This crate ties attachment persistence to the save and delete cycle of a
//! host-owned business record. An [`AttachmentLifecycle`] is bound once per
//! attachment slot and driven from the owner's persistence hooks: uploads
//! staged during validation are recorded, written to storage and (for
//! images) rendered into variants when the owner itself is saved, and
//! removed when the owner goes away.
//!
//! # Features
//!
//! - **Lifecycle hooks** mirroring the owner's cycle: `before_validate`,
//!   `before_save`, `after_save`, `before_delete`
//! - **Save actions** on re-save: append, replace the first attachment in
//!   place, or clear the slot first
//! - **Scenario gating**, so bulk or search operations never touch files
//! - **Variant generation** from named profiles, cascading on delete
//! - **Completion events** fired once per persisted original
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use affix_imaging::VariantProfile;
//! use affix_lifecycle::{AttachmentLifecycle, SlotValue};
//! use affix_records::PgRecordStore;
//!
//! let lifecycle = AttachmentLifecycle::builder("avatar", Arc::new(store))
//!     .read_with(|user: &User| user.avatar.clone())
//!     .write_with(|user: &mut User, value| user.avatar = value)
//!     .variant("thumb", VariantProfile::width(100))
//!     .build()?;
//!
//! lifecycle.before_validate(&mut user).await?;
//! // ... host validates and saves the user ...
//! lifecycle.after_save(&user).await?;
//! ```

pub mod controller;
pub mod error;
pub mod event;
pub mod intake;
pub mod slot;

pub use controller::{AttachmentLifecycle, LifecycleBuilder};
pub use error::{LifecycleError, LifecycleResult};
pub use event::UploadCompleted;
pub use intake::{MemoryIntake, UploadIntake};
pub use slot::{SaveAction, SlotReader, SlotValue, SlotWriter, DEFAULT_SCENARIOS};
