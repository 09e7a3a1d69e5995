use std::path::Path;

use ctp_core::text::expand_ligatures;
use ctp_core::{BackendError, ExtractedText, Format, PdfBackend};

/// Warning attached when no backend produced any text.
pub const NO_TEXT_LAYER: &str = "no extractable text layer (possibly scanned)";

/// Runs PDF backends in order until one yields usable text.
///
/// A backend that errors or returns only whitespace hands over to the next
/// one; each handover is recorded as a warning on the result.
pub struct PdfPipeline {
    backends: Vec<Box<dyn PdfBackend>>,
    min_chars_per_page: usize,
}

impl PdfPipeline {
    pub fn new(backends: Vec<Box<dyn PdfBackend>>) -> Self {
        Self {
            backends,
            min_chars_per_page: 20,
        }
    }

    /// Average non-whitespace characters per page below which a document is
    /// reported as probably scanned. `0` disables the check.
    pub fn with_min_chars_per_page(mut self, n: usize) -> Self {
        self.min_chars_per_page = n;
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn extract(&self, path: &Path) -> Result<ExtractedText, BackendError> {
        let mut warnings = Vec::new();
        let mut last_err: Option<BackendError> = None;
        let mut empty: Option<ExtractedText> = None;

        for backend in &self.backends {
            let pages = match backend.extract_pages(path) {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::debug!(
                        backend = backend.name(),
                        path = %path.display(),
                        error = %e,
                        "PDF backend failed, trying next"
                    );
                    warnings.push(format!("{} failed: {}", backend.name(), e));
                    last_err = Some(e);
                    continue;
                }
            };

            let page_count = pages.len();
            let text = expand_ligatures(&pages.join("\n"));
            let visible = text.chars().filter(|c| !c.is_whitespace()).count();

            let result = ExtractedText::new(text, Format::Pdf, backend.name()).with_pages(page_count);

            if visible == 0 {
                tracing::debug!(
                    backend = backend.name(),
                    path = %path.display(),
                    "PDF backend returned no text"
                );
                warnings.push(format!("{} found no text", backend.name()));
                empty = Some(result);
                continue;
            }

            let mut result = result;
            if self.min_chars_per_page > 0
                && page_count > 0
                && visible / page_count < self.min_chars_per_page
            {
                warnings.push(format!(
                    "only {} characters over {} page(s); the PDF is probably scanned",
                    visible, page_count
                ));
            }
            result.warnings = warnings;
            return Ok(result);
        }

        if let Some(mut result) = empty {
            warnings.push(NO_TEXT_LAYER.to_string());
            result.warnings = warnings;
            return Ok(result);
        }

        Err(last_err
            .unwrap_or_else(|| BackendError::ExtractionError("no PDF backends configured".into())))
    }
}
