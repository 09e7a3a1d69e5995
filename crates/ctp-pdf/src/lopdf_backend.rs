use std::path::Path;

use lopdf::Document;

use ctp_core::{BackendError, PdfBackend};

/// Pure-Rust PDF text extraction built on lopdf.
///
/// Less faithful than MuPDF on complex layouts, but has no native
/// dependencies and copes with some files MuPDF rejects, which makes it the
/// fallback in the default pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let document = Document::load(path).map_err(|e| match e {
            lopdf::Error::IO(io) => BackendError::Io(io),
            other => BackendError::OpenError(other.to_string()),
        })?;

        let pages = document.get_pages();
        let mut pages_text = Vec::with_capacity(pages.len());

        // get_pages() is keyed by 1-based page number, so iteration is in order
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => pages_text.push(text),
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        page = page_number,
                        error = %e,
                        "lopdf could not extract page"
                    );
                    pages_text.push(String::new());
                }
            }
        }

        Ok(pages_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Write a one-font PDF with one page per entry of `lines`.
    fn write_pdf(path: &Path, lines: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_extracts_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        write_pdf(&path, &["Hello corpus", "Second page"]);

        let pages = LopdfBackend.extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Hello corpus"), "page 1: {:?}", pages[0]);
        assert!(pages[1].contains("Second page"), "page 2: {:?}", pages[1]);
    }

    #[test]
    fn test_not_a_pdf_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(matches!(
            LopdfBackend.extract_pages(&path),
            Err(BackendError::OpenError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LopdfBackend.extract_pages(&dir.path().join("missing.pdf")),
            Err(BackendError::Io(_))
        ));
    }
}
