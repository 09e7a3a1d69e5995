//! Office Open XML text extraction.
//!
//! DOCX and PPTX files are ZIP containers of XML parts; both extractors read
//! the parts they need straight out of the archive and stream the XML with
//! quick-xml.

use thiserror::Error;

pub mod docx;
mod ooxml;
pub mod pptx;

pub use docx::{extract_docx, extract_docx_from_reader};
pub use pptx::{PptxOptions, extract_pptx, extract_pptx_from_reader};

#[derive(Error, Debug)]
pub enum OfficeError {
    #[error("invalid ZIP container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("missing required part: {0}")]
    MissingPart(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
