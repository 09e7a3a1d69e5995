use std::path::Path;

use ctp_core::{ExtractedText, Format};

use crate::MarkupError;
use crate::encoding::{decode_with, detect_encoding};

/// Read a text file of unknown encoding as UTF-8.
pub fn extract_plain(path: &Path) -> Result<ExtractedText, MarkupError> {
    let bytes = std::fs::read(path)?;
    Ok(plain_from_bytes(&bytes))
}

pub(crate) fn plain_from_bytes(bytes: &[u8]) -> ExtractedText {
    let detected = detect_encoding(bytes);
    let (text, had_errors) = decode_with(bytes, &detected);

    let mut extracted =
        ExtractedText::new(text, Format::Text, "text").with_encoding(detected.encoding.name());
    if had_errors {
        extracted.warnings.push(format!(
            "malformed {} sequences replaced",
            detected.encoding.name()
        ));
    }
    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Grüße aus Köln\n").unwrap();

        let extracted = extract_plain(&path).unwrap();
        assert_eq!(extracted.text, "Grüße aus Köln\n");
        assert_eq!(extracted.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(extracted.format, Format::Text);
        assert!(extracted.warnings.is_empty());
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "plain".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let extracted = plain_from_bytes(&bytes);
        assert_eq!(extracted.text, "plain");
        assert_eq!(extracted.encoding.as_deref(), Some("UTF-16LE"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            extract_plain(Path::new("/nonexistent/file.txt")),
            Err(MarkupError::Io(_))
        ));
    }
}
