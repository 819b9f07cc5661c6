//! Best-effort EXIF extraction.

use std::io::Cursor;

use serde_json::{Map, Value};
use tracing::warn;

/// Reads the EXIF block of raw image bytes into a JSON object string keyed
/// by tag name.
///
/// An upload must never fail because its metadata is unreadable, so every
/// problem collapses to `None` after a warning. Partially damaged blocks
/// still yield the readable fields.
pub fn extract_exif(data: &[u8]) -> Option<String> {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new()
        .continue_on_error(true)
        .read_from_container(&mut cursor)
        .or_else(|e| e.distill_partial_result(|_| {}))
    {
        Ok(exif) => exif,
        // Most images simply carry no EXIF block; that is not worth a log line.
        Err(exif::Error::NotFound(_)) => return None,
        Err(e) => {
            warn!(error = %e, "EXIF extraction failed");
            return None;
        }
    };

    let mut fields = Map::new();
    for field in exif.fields() {
        fields.insert(
            field.tag.to_string(),
            Value::String(field.display_value().with_unit(&exif).to_string()),
        );
    }
    serde_json::to_string(&Value::Object(fields)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // A TIFF container with a single ImageDescription entry reading "cat".
    const TIFF_WITH_DESCRIPTION: &[u8] = &[
        0x4D, 0x4D, 0x00, 0x2A, // big-endian TIFF magic
        0x00, 0x00, 0x00, 0x08, // IFD offset
        0x00, 0x01, // one entry
        0x01, 0x0E, // ImageDescription
        0x00, 0x02, // ASCII
        0x00, 0x00, 0x00, 0x04, // four bytes
        0x63, 0x61, 0x74, 0x00, // "cat\0"
        0x00, 0x00, 0x00, 0x00, // no next IFD
    ];

    #[test]
    fn test_extract_exif_reads_tags() {
        let blob = extract_exif(TIFF_WITH_DESCRIPTION).unwrap();

        let parsed: Value = serde_json::from_str(&blob).unwrap();
        let description = parsed["ImageDescription"].as_str().unwrap();
        assert!(description.contains("cat"));
    }

    #[test]
    fn test_extract_exif_tolerates_arbitrary_bytes() {
        assert_eq!(extract_exif(b"not an image at all"), None);
        assert_eq!(extract_exif(&[]), None);
    }

    #[test]
    fn test_extract_exif_tolerates_images_without_exif() {
        // Smallest valid PNG-ish payload the decoder will reject cleanly.
        let png = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(extract_exif(&png), None);
    }
}
