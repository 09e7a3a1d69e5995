//! Extraction for the byte-oriented formats: plain text, HTML and RTF.
//!
//! All three start from raw bytes of unknown encoding, so they share the
//! detection chain in [`encoding`].

use thiserror::Error;

pub mod encoding;
pub mod html;
pub mod plain;
pub mod rtf;

pub use encoding::{Confidence, DetectedEncoding, decode, detect_encoding};
pub use html::{extract_html, html_to_text};
pub use plain::extract_plain;
pub use rtf::{extract_rtf, rtf_to_text};

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("not an RTF document (missing {{\\rtf header)")]
    NotRtf,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
