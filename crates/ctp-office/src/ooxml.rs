use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::OfficeError;

/// A single `<Relationship>` from a `.rels` part.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Read a part as text. `Ok(None)` if the archive has no such entry.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, OfficeError> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let bytes = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&buf);
    Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
}

/// Entries named `<prefix><N><suffix>`, ordered by `N`.
///
/// `header10.xml` sorts after `header2.xml`, unlike a plain name sort.
pub(crate) fn numbered_parts<R: Read + Seek>(
    archive: &ZipArchive<R>,
    prefix: &str,
    suffix: &str,
) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
            if number.is_empty() {
                return Some((0, name.to_string()));
            }
            number.parse::<u32>().ok().map(|n| (n, name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

/// Parse the relationships in a `.rels` part.
pub(crate) fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                };
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value()?.into_owned();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Resolve a relationship target against the directory of its source part.
///
/// `resolve_target("ppt/slides", "../notesSlides/n1.xml")` gives
/// `ppt/notesSlides/n1.xml`; absolute targets are taken from the package root.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute.split('/').collect());
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };
    segments.extend(target.split('/'));
    normalize(segments)
}

fn normalize(segments: Vec<&str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in segments {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}

/// The `.rels` part that belongs to `part` (`a/b.xml` → `a/_rels/b.xml.rels`).
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

pub(crate) fn parent_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Accumulates run text with paragraph and table structure.
///
/// Outside tables a paragraph ends a line. Inside a cell, paragraphs are
/// joined by spaces; cells end with a tab and rows with a newline.
#[derive(Debug, Default)]
pub(crate) struct TextBuilder {
    out: String,
    cell_depth: usize,
}

impl TextBuilder {
    pub fn push_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub fn push(&mut self, c: char) {
        self.out.push(c);
    }

    pub fn end_paragraph(&mut self) {
        if self.cell_depth == 0 {
            self.out.push('\n');
        } else if !self.out.is_empty() && !self.out.ends_with(&[' ', '\t', '\n'][..]) {
            self.out.push(' ');
        }
    }

    pub fn start_cell(&mut self) {
        self.cell_depth += 1;
    }

    pub fn end_cell(&mut self) {
        self.cell_depth = self.cell_depth.saturating_sub(1);
        let len = self.out.trim_end_matches(' ').len();
        self.out.truncate(len);
        self.out.push('\t');
    }

    pub fn end_row(&mut self) {
        if self.out.ends_with('\t') {
            self.out.pop();
        }
        self.out.push('\n');
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_target("ppt/slides", "../notesSlides/notesSlide3.xml"),
            "ppt/notesSlides/notesSlide3.xml"
        );
        assert_eq!(resolve_target("ppt", "/ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
        assert_eq!(resolve_target("", "./word/document.xml"), "word/document.xml");
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(rels_path_for("ppt/slides/slide4.xml"), "ppt/slides/_rels/slide4.xml.rels");
        assert_eq!(rels_path_for("document.xml"), "_rels/document.xml.rels");
        assert_eq!(parent_dir("ppt/slides/slide4.xml"), "ppt/slides");
    }

    #[test]
    fn test_text_builder_table() {
        let mut b = TextBuilder::default();
        b.start_cell();
        b.push_str("a");
        b.end_paragraph();
        b.push_str("b");
        b.end_paragraph();
        b.end_cell();
        b.start_cell();
        b.push_str("c");
        b.end_paragraph();
        b.end_cell();
        b.end_row();
        b.push_str("after");
        b.end_paragraph();
        assert_eq!(b.finish(), "a b\tc\nafter\n");
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].id, "rId2");
        assert!(rels[0].rel_type.ends_with("/slide"));
        assert_eq!(rels[0].target, "slides/slide1.xml");
    }
}
