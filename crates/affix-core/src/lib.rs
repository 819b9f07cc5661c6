//! # affix-core
//!
//! Core types and traits for Affix.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Common error types (configuration and validation errors)
//! - Core traits (Identifiable, OwningRecord)
//! - The staged upload payload shared by intake, records, and the lifecycle

pub mod error;
pub mod traits;
pub mod upload;

pub use error::*;
pub use traits::*;
pub use upload::*;
