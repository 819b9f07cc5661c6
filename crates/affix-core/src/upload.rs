//! Staged upload payload
//!
//! A staged upload is an in-memory reference to file bytes received in the
//! current request, not yet persisted to any backend. It carries the
//! client-supplied file name and an optional content-type hint; everything
//! else about the stored file is derived later by the metadata record.

use std::path::Path;

use bytes::Bytes;

/// An upload staged for the current owning-record save
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Client-supplied file name, e.g. "cat.png"
    pub original_name: String,
    /// File bytes
    pub data: Bytes,
    /// Content type reported by the client, if any
    pub content_type: Option<String>,
}

impl StagedUpload {
    pub fn new(original_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            data: data.into(),
            content_type: None,
        }
    }

    /// Set the client-reported content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// File name without its extension
    pub fn base_name(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.original_name)
            .to_string()
    }

    /// Lowercased extension, empty when the name has none
    pub fn extension(&self) -> String {
        Path::new(&self.original_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Size of the staged bytes
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }

    /// Content type: the client hint when present, otherwise guessed from
    /// the file name, falling back to application/octet-stream
    pub fn mime_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.original_name)
                .first_or_octet_stream()
                .to_string()
        })
    }

    /// Check if this upload looks like an image
    pub fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts() {
        let upload = StagedUpload::new("cat.png", Bytes::from_static(b"bytes"));
        assert_eq!(upload.base_name(), "cat");
        assert_eq!(upload.extension(), "png");
        assert_eq!(upload.size(), 5);
    }

    #[test]
    fn test_extension_lowercased() {
        let upload = StagedUpload::new("REPORT.PDF", Bytes::new());
        assert_eq!(upload.base_name(), "REPORT");
        assert_eq!(upload.extension(), "pdf");
    }

    #[test]
    fn test_no_extension() {
        let upload = StagedUpload::new("README", Bytes::new());
        assert_eq!(upload.base_name(), "README");
        assert_eq!(upload.extension(), "");
    }

    #[test]
    fn test_mime_type_from_hint() {
        let upload =
            StagedUpload::new("data.bin", Bytes::new()).with_content_type("application/pdf");
        assert_eq!(upload.mime_type(), "application/pdf");
    }

    #[test]
    fn test_mime_type_guessed() {
        let upload = StagedUpload::new("cat.png", Bytes::new());
        assert_eq!(upload.mime_type(), "image/png");
        assert!(upload.is_image());
    }

    #[test]
    fn test_mime_type_fallback() {
        let upload = StagedUpload::new("mystery", Bytes::new());
        assert_eq!(upload.mime_type(), "application/octet-stream");
        assert!(!upload.is_image());
    }
}
