use std::path::{Path, PathBuf};

use thiserror::Error;

use ctp_core::{BackendError, Config, ExtractedText, Format, PdfBackend, PdfBackendChoice};
use ctp_markup::MarkupError;
use ctp_office::{OfficeError, PptxOptions};
use ctp_pdf::{LopdfBackend, PdfPipeline};

pub mod archive;
pub mod detect;
pub mod discover;
pub mod output;
pub mod pool;

// Re-export the pieces callers need alongside extraction
pub use archive::{ArchiveExtraction, ExtractedDocument, extract_archive, is_archive_path};
pub use ctp_core::{ConversionOutcome, ConversionStatus, ProgressEvent};
pub use detect::{detect_format, sniff_format};
pub use discover::{DiscoverOptions, Discovery, InputFile, discover_inputs};
pub use output::{OutputPlanner, output_path_for};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("PDF extraction error: {0}")]
    Backend(#[from] BackendError),
    #[error("Office document error: {0}")]
    Office(#[from] OfficeError),
    #[error("{0}")]
    Markup(#[from] MarkupError),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[cfg(not(feature = "mupdf"))]
    #[error("MuPDF support not compiled in (enable the `mupdf` feature of ctp-ingest)")]
    NoMupdfSupport,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction settings that are independent of where output goes.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub pdf_backend: PdfBackendChoice,
    pub header_ratio: f32,
    pub footer_ratio: f32,
    pub min_chars_per_page: usize,
    pub pptx: PptxOptions,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pdf_backend: config.pdf_backend,
            header_ratio: config.header_ratio,
            footer_ratio: config.footer_ratio,
            min_chars_per_page: config.min_chars_per_page,
            pptx: PptxOptions::default(),
        }
    }
}

/// Extract the text of a document in any supported format.
///
/// The format comes from the extension, or from the file's leading bytes
/// when the extension is missing or unknown:
/// - PDF → MuPDF and/or lopdf, per [`IngestOptions::pdf_backend`]
/// - DOCX, PPTX → Office Open XML readers
/// - RTF, HTML, plain text → markup readers with encoding detection
pub fn extract_text(path: &Path, options: &IngestOptions) -> Result<ExtractedText, IngestError> {
    let format = detect_format(path)?
        .ok_or_else(|| IngestError::UnsupportedFormat(path.to_path_buf()))?;
    extract_as(path, format, options)
}

/// Extract `path` as the given format, skipping detection.
pub fn extract_as(
    path: &Path,
    format: Format,
    options: &IngestOptions,
) -> Result<ExtractedText, IngestError> {
    tracing::debug!(path = %path.display(), format = %format, "extracting");
    let extracted = match format {
        Format::Pdf => pdf_pipeline(options)?.extract(path)?,
        Format::Docx => ctp_office::extract_docx(path)?,
        Format::Pptx => ctp_office::extract_pptx(path, &options.pptx)?,
        Format::Rtf => ctp_markup::extract_rtf(path)?,
        Format::Html => ctp_markup::extract_html(path)?,
        Format::Text => ctp_markup::extract_plain(path)?,
    };
    Ok(extracted)
}

/// Build the PDF backend chain for the configured choice.
pub fn pdf_pipeline(options: &IngestOptions) -> Result<PdfPipeline, IngestError> {
    let mut backends: Vec<Box<dyn PdfBackend>> = Vec::new();
    match options.pdf_backend {
        PdfBackendChoice::Auto => {
            if cfg!(feature = "mupdf") {
                backends.push(mupdf_backend(options)?);
            }
            backends.push(Box::new(LopdfBackend::new()));
        }
        PdfBackendChoice::Mupdf => backends.push(mupdf_backend(options)?),
        PdfBackendChoice::Lopdf => backends.push(Box::new(LopdfBackend::new())),
    }
    Ok(PdfPipeline::new(backends).with_min_chars_per_page(options.min_chars_per_page))
}

#[cfg(feature = "mupdf")]
fn mupdf_backend(options: &IngestOptions) -> Result<Box<dyn PdfBackend>, IngestError> {
    Ok(Box::new(
        ctp_pdf_mupdf::MupdfBackend::new()
            .with_header_exclusion(options.header_ratio)
            .with_footer_exclusion(options.footer_ratio),
    ))
}

#[cfg(not(feature = "mupdf"))]
fn mupdf_backend(_options: &IngestOptions) -> Result<Box<dyn PdfBackend>, IngestError> {
    Err(IngestError::NoMupdfSupport)
}
