pub mod lopdf_backend;
pub mod pipeline;

pub use lopdf_backend::LopdfBackend;
pub use pipeline::PdfPipeline;
// Re-export domain types from core (canonical definitions live there)
pub use ctp_core::{BackendError, ExtractedText, PdfBackend};
