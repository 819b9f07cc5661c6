//! Default [`ImageTransform`] backed by the `image` crate.
//!
//! Decoding and encoding are CPU bound, so both run inside
//! `spawn_blocking`. The encoded bytes come back to the async side and are
//! staged through the shared staging area.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, instrument};

use affix_storage::{stage_bytes, StagedFile};

use crate::transform::{ImageTransform, ResizeMode, TransformError, TransformResult};

/// Derives a missing target side from the source aspect ratio.
fn fill_dimensions(width: u32, height: u32, src_width: u32, src_height: u32) -> (u32, u32) {
    let ratio = src_width as f64 / src_height as f64;
    match (width, height) {
        (0, 0) => (src_width, src_height),
        (w, 0) => (w, (w as f64 / ratio).ceil() as u32),
        (0, h) => ((h as f64 * ratio).ceil() as u32, h),
        (w, h) => (w, h),
    }
}

/// Picks the output format from the source extension, falling back to PNG.
fn output_format(src: &Path) -> (ImageFormat, String) {
    if let Some(ext) = src.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if let Some(format) = ImageFormat::from_extension(&ext) {
            return (format, ext);
        }
    }
    (ImageFormat::Png, "png".to_string())
}

fn encode_to_buffer(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> TransformResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let mut cursor = Cursor::new(&mut buf);
            let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
            img.write_with_encoder(encoder)?;
        }
        _ => {
            img.write_to(&mut Cursor::new(&mut buf), format)?;
        }
    }
    Ok(buf)
}

/// Image transform built on the `image` crate.
///
/// Stateless; cheap to copy and share.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEngine;

impl ImageEngine {
    /// Creates a new engine.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageTransform for ImageEngine {
    #[instrument(skip(self, src), fields(src = %src.display()))]
    async fn resize(
        &self,
        src: &Path,
        width: u32,
        height: u32,
        mode: ResizeMode,
        quality: u8,
    ) -> TransformResult<StagedFile> {
        let src = src.to_path_buf();
        let task = tokio::task::spawn_blocking(move || -> TransformResult<(Vec<u8>, String)> {
            let img = image::open(&src)?;
            let (w, h) = fill_dimensions(width, height, img.width(), img.height());
            let resized = match mode {
                ResizeMode::Inset => img.resize(w, h, FilterType::Lanczos3),
                ResizeMode::Outbound => img.resize_to_fill(w, h, FilterType::Lanczos3),
            };
            let (format, extension) = output_format(&src);
            let bytes = encode_to_buffer(&resized, format, quality)?;
            Ok((bytes, extension))
        });
        let (bytes, extension) = task
            .await
            .map_err(|e| TransformError::TaskFailed(e.to_string()))??;

        let staged = stage_bytes(&bytes, &extension).await?;
        debug!(bytes = bytes.len(), "Resized image");
        Ok(staged)
    }

    #[instrument(skip(self, src), fields(src = %src.display()))]
    async fn crop(
        &self,
        src: &Path,
        width: u32,
        height: u32,
        origin: (u32, u32),
        quality: u8,
    ) -> TransformResult<StagedFile> {
        let src = src.to_path_buf();
        let task = tokio::task::spawn_blocking(move || -> TransformResult<(Vec<u8>, String)> {
            let img = image::open(&src)?;
            let (w, h) = fill_dimensions(width, height, img.width(), img.height());
            let cropped = img.crop_imm(origin.0, origin.1, w, h);
            let (format, extension) = output_format(&src);
            let bytes = encode_to_buffer(&cropped, format, quality)?;
            Ok((bytes, extension))
        });
        let (bytes, extension) = task
            .await
            .map_err(|e| TransformError::TaskFailed(e.to_string()))??;

        let staged = stage_bytes(&bytes, &extension).await?;
        debug!(bytes = bytes.len(), "Cropped image");
        Ok(staged)
    }
}
