use std::path::Path;

use mupdf::{Document, TextPageFlags};

use ctp_core::{BackendError, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency so
/// that builds using only the lopdf backend do not pull it in.
///
/// Header and footer bands can be excluded per page so that running heads
/// and page numbers do not interrupt paragraphs that span a page break.
/// Both bands are off by default.
#[derive(Debug, Default, Clone)]
pub struct MupdfBackend {
    /// Fraction of page height from the top to exclude, if any.
    header_exclusion_ratio: Option<f32>,
    /// Fraction of page height from the bottom to exclude, if any.
    footer_exclusion_ratio: Option<f32>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header exclusion ratio. Pass `0.0` to disable.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }

    /// Set the footer exclusion ratio. Pass `0.0` to disable.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }
}

impl PdfBackend for MupdfBackend {
    fn name(&self) -> &str {
        "mupdf"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages_text = Vec::new();

        for (index, page_result) in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
            .enumerate()
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            let page_bounds = page
                .bounds()
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let page_height = page_bounds.y1 - page_bounds.y0;

            let header_threshold = self
                .header_exclusion_ratio
                .map(|r| page_bounds.y0 + page_height * r);
            let footer_threshold = self
                .footer_exclusion_ratio
                .map(|r| page_bounds.y1 - page_height * r);

            let mut page_text = String::new();
            let mut skipped_blocks = 0usize;
            for block in text_page.blocks() {
                let block_bounds = block.bounds();

                if header_threshold.is_some_and(|t| block_bounds.y1 <= t)
                    || footer_threshold.is_some_and(|t| block_bounds.y0 >= t)
                {
                    skipped_blocks += 1;
                    continue;
                }

                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
                // Blocks are paragraphs or columns; keep them apart
                page_text.push('\n');
            }

            if skipped_blocks > 0 {
                tracing::trace!(page = index + 1, skipped_blocks, "excluded header/footer blocks");
            }
            pages_text.push(page_text);
        }

        Ok(pages_text)
    }
}
