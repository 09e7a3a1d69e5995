use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use ctp_core::Format;

use crate::IngestError;

/// A document unpacked from an archive.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Where the document was written.
    pub path: PathBuf,
    /// The entry's path inside the archive.
    pub entry: PathBuf,
}

/// Result of archive extraction, including any warnings (e.g. size limit reached).
#[derive(Debug, Default)]
pub struct ArchiveExtraction {
    pub documents: Vec<ExtractedDocument>,
    pub warnings: Vec<String>,
}

/// Returns true if the given path looks like a supported archive.
pub fn is_archive_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".zip") || name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// File name of an archive without its archive extension
/// (`corpus.tar.gz` → `corpus`).
pub fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    for suffix in [".tar.gz", ".tgz", ".zip"] {
        if lower.ends_with(suffix) {
            return name[..name.len() - suffix.len()].to_string();
        }
    }
    name
}

/// Returns true if the file content looks valid for the format its name claims.
/// PDFs must start with `%PDF-` and Office files must be ZIPs; the text
/// formats have no magic bytes to check.
fn passes_magic_check(format: Format, data: &[u8]) -> bool {
    match format {
        Format::Pdf => data.starts_with(b"%PDF-"),
        Format::Docx | Format::Pptx => data.starts_with(b"PK\x03\x04"),
        Format::Rtf | Format::Html | Format::Text => true,
    }
}

/// Read an archive file from disk, detect its type, and extract supported
/// documents into `dir`, keeping their paths inside the archive.
///
/// Supports ZIP and tar.gz archives. Type is detected by extension and magic bytes.
/// `max_size` limits total extracted bytes (0 = unlimited). When the limit is reached,
/// extraction stops and a warning is included in the result.
pub fn extract_archive(
    archive_path: &Path,
    dir: &Path,
    max_size: u64,
) -> Result<ArchiveExtraction, IngestError> {
    let data = std::fs::read(archive_path)?;

    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    // Detect by extension first, then fall back to magic bytes
    let result = if name.ends_with(".zip") || data.starts_with(b"PK") {
        extract_from_zip(&data, dir, max_size)?
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") || data.starts_with(&[0x1f, 0x8b])
    {
        extract_from_tar_gz(&data, dir, max_size)?
    } else {
        return Err(IngestError::Archive("unsupported archive format".to_string()));
    };

    if result.documents.is_empty() {
        return Err(IngestError::Archive(
            "no supported documents found".to_string(),
        ));
    }
    tracing::debug!(
        archive = %archive_path.display(),
        documents = result.documents.len(),
        "archive extracted"
    );
    Ok(result)
}

/// Extract supported documents from a ZIP archive.
/// `max_size` limits total extracted bytes (0 = unlimited).
pub fn extract_from_zip(
    data: &[u8],
    dir: &Path,
    max_size: u64,
) -> Result<ArchiveExtraction, IngestError> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| IngestError::Archive(format!("failed to open ZIP: {}", e)))?;

    let mut sink = Sink::new(dir, max_size);

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| IngestError::Archive(format!("failed to read ZIP entry: {}", e)))?;

        // enclosed_name() rejects path traversal
        let Some(name) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        if file.is_dir() {
            continue;
        }
        let Some(format) = sink.accepts(&name) else {
            continue;
        };
        if !sink.reserve(file.size()) {
            break;
        }

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        sink.write(&name, format, &buf)?;
    }

    Ok(sink.finish())
}

/// Extract supported documents from a tar.gz archive.
/// `max_size` limits total extracted bytes (0 = unlimited).
pub fn extract_from_tar_gz(
    data: &[u8],
    dir: &Path,
    max_size: u64,
) -> Result<ArchiveExtraction, IngestError> {
    let gz = GzDecoder::new(data);
    let mut archive = Archive::new(gz);

    let entries = archive
        .entries()
        .map_err(|e| IngestError::Archive(format!("failed to read tar.gz: {}", e)))?;

    let mut sink = Sink::new(dir, max_size);

    for entry in entries {
        let mut entry =
            entry.map_err(|e| IngestError::Archive(format!("failed to read tar entry: {}", e)))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| IngestError::Archive(format!("failed to read entry path: {}", e)))?
            .to_path_buf();
        // Only plain relative components; rejects `..` and absolute paths
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            continue;
        }
        let Some(format) = sink.accepts(&path) else {
            continue;
        };
        if !sink.reserve(entry.size()) {
            break;
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        sink.write(&path, format, &buf)?;
    }

    Ok(sink.finish())
}

/// Shared filtering, size accounting and writing for both archive kinds.
struct Sink<'a> {
    dir: &'a Path,
    max_size: u64,
    total_size: u64,
    result: ArchiveExtraction,
}

impl<'a> Sink<'a> {
    fn new(dir: &'a Path, max_size: u64) -> Self {
        Self {
            dir,
            max_size,
            total_size: 0,
            result: ArchiveExtraction::default(),
        }
    }

    /// The entry's format if it should be extracted. Skips macOS resource
    /// forks, hidden files and hidden directories, and unsupported types.
    fn accepts(&self, name: &Path) -> Option<Format> {
        let hidden = name.components().any(|c| {
            let part = c.as_os_str().to_string_lossy();
            part.starts_with('.') || part == "__MACOSX"
        });
        if hidden {
            return None;
        }
        Format::from_path(name)
    }

    /// Account for `size` more bytes. Returns false once the limit is passed.
    fn reserve(&mut self, size: u64) -> bool {
        if self.max_size == 0 {
            return true;
        }
        self.total_size += size;
        if self.total_size > self.max_size {
            self.result.warnings.push(format!(
                "Size limit ({}MB) reached after {} files, skipping remaining",
                self.max_size / 1024 / 1024,
                self.result.documents.len()
            ));
            return false;
        }
        true
    }

    fn write(&mut self, name: &Path, format: Format, data: &[u8]) -> Result<(), IngestError> {
        // Verify magic bytes
        if !passes_magic_check(format, data) {
            self.result.warnings.push(format!(
                "{} does not look like a {} file, skipped",
                name.display(),
                format.label()
            ));
            return Ok(());
        }

        let out_path = self.dir.join(name);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, data)?;

        self.result.documents.push(ExtractedDocument {
            path: out_path,
            entry: name.to_path_buf(),
        });
        Ok(())
    }

    fn finish(self) -> ArchiveExtraction {
        self.result
    }
}
