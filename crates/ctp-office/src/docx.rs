use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use ctp_core::{ExtractedText, Format};

use crate::OfficeError;
use crate::ooxml::{TextBuilder, numbered_parts, read_part};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the text of a `.docx` file.
///
/// Headers come first, then the body, then footers, footnotes and endnotes.
pub fn extract_docx(path: &Path) -> Result<ExtractedText, OfficeError> {
    let file = File::open(path)?;
    extract_docx_from_reader(BufReader::new(file))
}

pub fn extract_docx_from_reader<R: Read + Seek>(reader: R) -> Result<ExtractedText, OfficeError> {
    let mut archive = ZipArchive::new(reader)?;

    let body = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| OfficeError::MissingPart(DOCUMENT_PART.to_string()))?;

    let headers = numbered_parts(&archive, "word/header", ".xml");
    let footers = numbered_parts(&archive, "word/footer", ".xml");

    let mut sections = Vec::new();
    for name in &headers {
        if let Some(xml) = read_part(&mut archive, name)? {
            sections.push(document_xml_to_text(&xml)?);
        }
    }
    sections.push(document_xml_to_text(&body)?);
    for name in footers
        .iter()
        .map(String::as_str)
        .chain(["word/footnotes.xml", "word/endnotes.xml"])
    {
        if let Some(xml) = read_part(&mut archive, name)? {
            sections.push(document_xml_to_text(&xml)?);
        }
    }

    let text = sections
        .iter()
        .map(|s| s.trim_matches('\n'))
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    tracing::trace!(
        headers = headers.len(),
        footers = footers.len(),
        chars = text.len(),
        "extracted docx"
    );

    Ok(ExtractedText::new(text, Format::Docx, "docx"))
}

/// Convert one WordprocessingML part (`document.xml`, `header1.xml`, ...)
/// to plain text.
///
/// Paragraphs end with a newline. Inside tables, cells are separated by
/// tabs and rows by newlines, with paragraphs within a cell joined by spaces.
pub fn document_xml_to_text(xml: &str) -> Result<String, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut out = TextBuilder::default();

    let mut in_text = false;
    let mut in_tab_stops = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                b"tc" => out.start_cell(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                // w:tab inside w:tabs is a tab stop definition, not content
                b"tab" if !in_tab_stops => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"noBreakHyphen" => out.push('-'),
                _ => {}
            },
            Event::Text(e) if in_text => out.push_str(&e.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => out.end_paragraph(),
                b"tc" => out.end_cell(),
                b"tr" => out.end_row(),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let xml = wrap(
            r#"<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_xml_to_text(&xml).unwrap(), "Hello world\nSecond\n");
    }

    #[test]
    fn test_tabs_breaks_and_hyphens() {
        let xml = wrap(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t><w:noBreakHyphen/><w:t>d</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_xml_to_text(&xml).unwrap(), "a\tb\nc-d\n");
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = wrap(r#"<w:p><w:r><w:t>R&amp;D &lt;draft&gt;</w:t></w:r></w:p>"#);
        assert_eq!(document_xml_to_text(&xml).unwrap(), "R&D <draft>\n");
    }

    #[test]
    fn test_table_rows_and_cells() {
        let xml = wrap(concat!(
            "<w:tbl>",
            "<w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p><w:r><w:t>Count</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>apples</w:t></w:r></w:p><w:p><w:r><w:t>red</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p><w:r><w:t>3</w:t></w:r></w:p></w:tc></w:tr>",
            "</w:tbl>",
            "<w:p><w:r><w:t>After</w:t></w:r></w:p>",
        ));
        assert_eq!(
            document_xml_to_text(&xml).unwrap(),
            "Name\tCount\napples red\t3\nAfter\n"
        );
    }

    #[test]
    fn test_instructions_and_deleted_text_ignored() {
        let xml = wrap(
            r#"<w:p><w:r><w:instrText> PAGE </w:instrText></w:r><w:del><w:r><w:delText>old</w:delText></w:r></w:del><w:r><w:t>new</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_xml_to_text(&xml).unwrap(), "new\n");
    }
}
