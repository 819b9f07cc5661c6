//! Declarative description of image renditions.
//!
//! A [`VariantProfile`] lists the transform steps a rendition is built from,
//! the encode quality of the final file and an optional storage directory
//! override. Profiles are plain data so they can live in configuration and
//! be validated once, when the lifecycle is bound to a record type.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use affix_core::ConfigError;
use affix_storage::{stage_bytes, StagedFile};

use crate::transform::{ImageTransform, ResizeMode, TransformResult};

/// Encode quality applied when a profile does not choose one.
pub const DEFAULT_QUALITY: u8 = 100;

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

/// A single operation in a rendition pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransformStep {
    /// Scale the image towards a target box.
    Resize {
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        mode: ResizeMode,
    },
    /// Cut a window out of the image.
    Crop {
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        origin: (u32, u32),
    },
}

impl TransformStep {
    /// Creates an inset resize step.
    pub fn resize(width: u32, height: u32) -> Self {
        Self::Resize {
            width,
            height,
            mode: ResizeMode::Inset,
        }
    }

    /// Creates a crop step anchored at the top-left corner.
    pub fn crop(width: u32, height: u32) -> Self {
        Self::Crop {
            width,
            height,
            origin: (0, 0),
        }
    }

    /// Replaces the resize mode. No effect on crop steps.
    pub fn with_mode(self, new_mode: ResizeMode) -> Self {
        match self {
            Self::Resize { width, height, .. } => Self::Resize {
                width,
                height,
                mode: new_mode,
            },
            other => other,
        }
    }

    /// Replaces the crop origin. No effect on resize steps.
    pub fn with_origin(self, x: u32, y: u32) -> Self {
        match self {
            Self::Crop { width, height, .. } => Self::Crop {
                width,
                height,
                origin: (x, y),
            },
            other => other,
        }
    }

    /// Target width of this step, zero when derived from the aspect ratio.
    pub fn width(&self) -> u32 {
        match self {
            Self::Resize { width, .. } | Self::Crop { width, .. } => *width,
        }
    }

    /// Target height of this step, zero when derived from the aspect ratio.
    pub fn height(&self) -> u32 {
        match self {
            Self::Resize { height, .. } | Self::Crop { height, .. } => *height,
        }
    }

    /// At least one target side must be given; the other is derived.
    pub fn has_dimensions(&self) -> bool {
        self.width() > 0 || self.height() > 0
    }

    async fn run(
        &self,
        transform: &dyn ImageTransform,
        src: &Path,
        quality: u8,
    ) -> TransformResult<StagedFile> {
        match *self {
            Self::Resize {
                width,
                height,
                mode,
            } => transform.resize(src, width, height, mode, quality).await,
            Self::Crop {
                width,
                height,
                origin,
            } => transform.crop(src, width, height, origin, quality).await,
        }
    }
}

/// A named rendition recipe: steps, final encode quality and an optional
/// storage directory override for the derived rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantProfile {
    /// Steps applied in order, each consuming the previous output.
    #[serde(default)]
    pub steps: Vec<TransformStep>,
    /// Encode quality of the final file (lossy formats only).
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Storage directory for the derived rows, overriding the parent's.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for VariantProfile {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            quality: DEFAULT_QUALITY,
            path: None,
        }
    }
}

impl VariantProfile {
    /// Creates a profile from an explicit step list.
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Single inset resize towards `width` x `height`.
    pub fn resize(width: u32, height: u32) -> Self {
        Self::new(vec![TransformStep::resize(width, height)])
    }

    /// Single resize constrained by width, height follows the aspect ratio.
    pub fn width(width: u32) -> Self {
        Self::resize(width, 0)
    }

    /// Single resize constrained by height, width follows the aspect ratio.
    pub fn height(height: u32) -> Self {
        Self::resize(0, height)
    }

    /// Appends a step to the pipeline.
    pub fn step(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Sets the final encode quality.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the storage directory override for derived rows.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Checks every step carries at least one target side.
    ///
    /// Runs when the lifecycle is bound so a bad profile fails loudly at
    /// startup instead of on the first upload.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        for step in &self.steps {
            if !step.has_dimensions() {
                return Err(ConfigError::InvalidVariantDimensions {
                    profile: name.to_string(),
                    width: step.width(),
                    height: step.height(),
                });
            }
        }
        Ok(())
    }

    /// Runs the pipeline over `src`, returning the final staged file.
    ///
    /// Intermediate outputs feed the next step and are discarded as soon as
    /// they are consumed. Intermediate encodes use full quality; the profile
    /// quality applies to the last step only. An empty pipeline stages an
    /// unchanged copy of the source.
    pub async fn apply(
        &self,
        transform: &dyn ImageTransform,
        src: &Path,
    ) -> TransformResult<StagedFile> {
        let Some((last, head)) = self.steps.split_last() else {
            let data = tokio::fs::read(src).await?;
            let extension = src
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            return Ok(stage_bytes(&data, extension).await?);
        };

        let mut current: Option<StagedFile> = None;
        for step in head {
            let input = current
                .as_ref()
                .map(|staged| staged.path().to_path_buf())
                .unwrap_or_else(|| src.to_path_buf());
            let next = step.run(transform, &input, DEFAULT_QUALITY).await?;
            if let Some(staged) = current.take() {
                staged.cleanup().await?;
            }
            current = Some(next);
        }

        let input = current
            .as_ref()
            .map(|staged| staged.path().to_path_buf())
            .unwrap_or_else(|| src.to_path_buf());
        let output = last.run(transform, &input, self.quality).await?;
        if let Some(staged) = current.take() {
            staged.cleanup().await?;
        }

        debug!(steps = self.steps.len(), "Applied variant profile");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    struct RecordingTransform {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingTransform {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageTransform for RecordingTransform {
        async fn resize(
            &self,
            _src: &Path,
            width: u32,
            height: u32,
            _mode: ResizeMode,
            quality: u8,
        ) -> TransformResult<StagedFile> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("resize {}x{} q{}", width, height, quality));
            Ok(stage_bytes(b"resized", "png").await?)
        }

        async fn crop(
            &self,
            _src: &Path,
            width: u32,
            height: u32,
            _origin: (u32, u32),
            quality: u8,
        ) -> TransformResult<StagedFile> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("crop {}x{} q{}", width, height, quality));
            Ok(stage_bytes(b"cropped", "png").await?)
        }
    }

    #[test]
    fn test_validate_accepts_single_sided_steps() {
        assert!(VariantProfile::width(100).validate("thumb").is_ok());
        assert!(VariantProfile::height(80).validate("tall").is_ok());
        assert!(VariantProfile::resize(50, 50).validate("preview").is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let profile = VariantProfile::resize(0, 0);

        let err = profile.validate("thumb").unwrap_err();
        match err {
            ConfigError::InvalidVariantDimensions {
                profile,
                width,
                height,
            } => {
                assert_eq!(profile, "thumb");
                assert_eq!(width, 0);
                assert_eq!(height, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_checks_every_step() {
        let profile = VariantProfile::resize(100, 0).step(TransformStep::crop(0, 0));

        assert!(profile.validate("banner").is_err());
    }

    #[test]
    fn test_step_builders() {
        let step = TransformStep::resize(400, 300).with_mode(ResizeMode::Outbound);
        assert_eq!(
            step,
            TransformStep::Resize {
                width: 400,
                height: 300,
                mode: ResizeMode::Outbound,
            }
        );

        let step = TransformStep::crop(150, 150).with_origin(10, 20);
        assert_eq!(
            step,
            TransformStep::Crop {
                width: 150,
                height: 150,
                origin: (10, 20),
            }
        );
    }

    #[tokio::test]
    async fn test_apply_chains_steps_with_final_quality() {
        let transform = RecordingTransform::new();
        let profile = VariantProfile::resize(400, 300)
            .step(TransformStep::crop(150, 150))
            .with_quality(85);
        let src = stage_bytes(b"original", "png").await.unwrap();

        let output = profile.apply(&transform, src.path()).await.unwrap();

        let calls = transform.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["resize 400x300 q100", "crop 150x150 q85"]);
        assert!(output.path().exists());

        output.cleanup().await.unwrap();
        src.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_without_steps_copies_source() {
        let transform = RecordingTransform::new();
        let profile = VariantProfile::default();
        let src = stage_bytes(b"untouched", "png").await.unwrap();

        let output = profile.apply(&transform, src.path()).await.unwrap();

        assert!(transform.calls.lock().unwrap().is_empty());
        assert_ne!(output.path(), src.path());
        assert_eq!(std::fs::read(output.path()).unwrap(), b"untouched");

        output.cleanup().await.unwrap();
        src.cleanup().await.unwrap();
    }
}
