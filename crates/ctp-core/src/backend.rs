use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors provide raw per-page text; fallback between backends,
/// ligature expansion and scanned-document detection live in
/// `ctp_pdf::PdfPipeline`.
pub trait PdfBackend: Send + Sync {
    /// Short identifier reported in conversion outcomes.
    fn name(&self) -> &str;

    /// Extract the text of every page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError>;

    /// Extract the full text content of a PDF file.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        Ok(self.extract_pages(path)?.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoPages;

    impl PdfBackend for TwoPages {
        fn name(&self) -> &str {
            "two-pages"
        }

        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, BackendError> {
            Ok(vec!["first".into(), "second".into()])
        }
    }

    #[test]
    fn test_extract_text_joins_pages() {
        let text = TwoPages.extract_text(Path::new("x.pdf")).unwrap();
        assert_eq!(text, "first\nsecond");
    }
}
