use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use ctp_core::Format;

use crate::IngestError;

/// How many leading bytes are read to sniff a format.
pub const SNIFF_LEN: usize = 8192;
const HTML_SNIFF_LEN: usize = 1024;
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

const HTML_MARKERS: &[&str] = &["<!doctype html", "<html", "<head", "<body"];

/// Guess a format from a file's leading bytes.
///
/// ZIP containers are classified by the parts they hold, so `bytes` should
/// be the whole file when it is a ZIP. A truncated ZIP falls back to
/// scanning the local file headers for the part names.
pub fn sniff_format(bytes: &[u8]) -> Option<Format> {
    if bytes.starts_with(b"%PDF-") {
        return Some(Format::Pdf);
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return zip_format(Cursor::new(bytes)).or_else(|| scan_zip_headers(bytes));
    }

    let (body, utf16) = match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => (rest, false),
        [0xFF, 0xFE, ..] | [0xFE, 0xFF, ..] => (bytes, true),
        _ => (bytes, false),
    };
    if utf16 {
        return Some(Format::Text);
    }

    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let body = &body[start..];

    if body.starts_with(b"{\\rtf") {
        return Some(Format::Rtf);
    }

    let head = String::from_utf8_lossy(&body[..body.len().min(HTML_SNIFF_LEN)]).to_ascii_lowercase();
    if HTML_MARKERS.iter().any(|m| head.contains(m)) {
        return Some(Format::Html);
    }

    if !bytes[..bytes.len().min(SNIFF_LEN)].contains(&0) {
        return Some(Format::Text);
    }
    None
}

/// Determine the format of a file: the extension wins, then the content.
pub fn detect_format(path: &Path) -> Result<Option<Format>, IngestError> {
    if let Some(format) = Format::from_path(path) {
        return Ok(Some(format));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;

    let format = if head.starts_with(ZIP_MAGIC) {
        zip_format(BufReader::new(File::open(path)?))
    } else {
        sniff_format(&head)
    };
    tracing::debug!(path = %path.display(), format = ?format, "sniffed format");
    Ok(format)
}

fn zip_format<R: Read + Seek>(reader: R) -> Option<Format> {
    let archive = ZipArchive::new(reader).ok()?;
    let mut format = None;
    for name in archive.file_names() {
        match name {
            "word/document.xml" => return Some(Format::Docx),
            "ppt/presentation.xml" => format = Some(Format::Pptx),
            _ => {}
        }
    }
    format
}

fn scan_zip_headers(bytes: &[u8]) -> Option<Format> {
    let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    if contains(b"word/") {
        Some(Format::Docx)
    } else if contains(b"ppt/") {
        Some(Format::Pptx)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn zip_with(names: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for name in names {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(b"<x/>").unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(sniff_format(b"%PDF-1.7\n..."), Some(Format::Pdf));
        assert_eq!(sniff_format(b"  {\\rtf1\\ansi hi}"), Some(Format::Rtf));
        assert_eq!(sniff_format(b"\xEF\xBB\xBF<!DOCTYPE html><p>x"), Some(Format::Html));
        assert_eq!(sniff_format(b"\n<HTML><body>x</body></HTML>"), Some(Format::Html));
        assert_eq!(sniff_format(b"Dear reader,\nhello."), Some(Format::Text));
        assert_eq!(sniff_format(b"\xFF\xFEh\x00i\x00"), Some(Format::Text));
        assert_eq!(sniff_format(b"\x7fELF\x02\x01\x01\x00\x00"), None);
    }

    #[test]
    fn test_sniff_office_containers() {
        let docx = zip_with(&["[Content_Types].xml", "word/document.xml"]);
        assert_eq!(sniff_format(&docx), Some(Format::Docx));

        let pptx = zip_with(&["[Content_Types].xml", "ppt/presentation.xml", "ppt/slides/slide1.xml"]);
        assert_eq!(sniff_format(&pptx), Some(Format::Pptx));

        let other = zip_with(&["data.csv"]);
        assert_eq!(sniff_format(&other), None);

        // Truncated before the central directory
        let cut = docx
            .windows(17)
            .position(|w| w == b"word/document.xml")
            .unwrap()
            + 17;
        assert_eq!(sniff_format(&docx[..cut]), Some(Format::Docx));
    }

    #[test]
    fn test_extension_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.htm");
        std::fs::write(&path, "plain words").unwrap();
        assert_eq!(detect_format(&path).unwrap(), Some(Format::Html));
    }

    #[test]
    fn test_detect_zip_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download");
        std::fs::write(&path, zip_with(&["ppt/presentation.xml"])).unwrap();
        assert_eq!(detect_format(&path).unwrap(), Some(Format::Pptx));
    }
}
