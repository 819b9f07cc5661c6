//! Image transformation for Affix attachments.
//!
//! This crate turns an uploaded image into derived renditions. It exposes
//! the [`ImageTransform`] trait as the seam the lifecycle controller talks
//! to, a declarative [`VariantProfile`] describing the steps a rendition is
//! built from, and [`ImageEngine`], the default implementation backed by the
//! `image` crate.
//!
//! # Features
//!
//! - **Resize** with inset (fit within) or outbound (fill and overflow)
//!   semantics, missing side derived from the source aspect ratio
//! - **Crop** from an arbitrary origin
//! - **Variant profiles** composed of a step list, validated when the
//!   lifecycle is bound rather than when the first upload arrives
//! - **EXIF extraction** that never fails the caller
//!
//! # Example
//!
//! ```rust,ignore
//! use affix_imaging::{ImageEngine, ImageTransform, ResizeMode};
//!
//! let engine = ImageEngine::new();
//! let thumb = engine
//!     .resize(path, 100, 0, ResizeMode::Inset, 100)
//!     .await?;
//! // thumb.path() now points at a staged temp file.
//! ```

pub mod engine;
pub mod metadata;
pub mod profile;
pub mod transform;

pub use engine::ImageEngine;
pub use metadata::extract_exif;
pub use profile::{TransformStep, VariantProfile, DEFAULT_QUALITY};
pub use transform::{ImageTransform, ResizeMode, TransformError, TransformResult};
