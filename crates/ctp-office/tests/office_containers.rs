use std::io::{Cursor, Write};

use ctp_core::Format;
use ctp_office::{OfficeError, PptxOptions, extract_docx, extract_docx_from_reader, extract_pptx_from_reader};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const SLIDE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const NOTES_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

fn zip_bytes(parts: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn word_part(root: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    format!(r#"<w:{root} xmlns:w="{W_NS}"><w:body>{body}</w:body></w:{root}>"#)
}

fn slide_xml(texts: &[&str]) -> String {
    let shapes: String = texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                r#"<p:sp><p:spPr><a:xfrm><a:off x="0" y="{}"/></a:xfrm></p:spPr><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                i * 1000,
                t
            )
        })
        .collect();
    format!(
        r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>"#
    )
}

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!(r#"<Relationships xmlns="rels">{body}</Relationships>"#)
}

#[test]
fn docx_orders_headers_body_footers_and_notes() {
    let bytes = zip_bytes(&[
        ("word/document.xml", word_part("document", &["Body one", "Body two"])),
        ("word/header2.xml", word_part("hdr", &["Second header"])),
        ("word/header1.xml", word_part("hdr", &["First header"])),
        ("word/footer1.xml", word_part("ftr", &["Footer"])),
        ("word/footnotes.xml", word_part("footnotes", &["A footnote"])),
    ]);

    let extracted = extract_docx_from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(extracted.format, Format::Docx);
    assert_eq!(
        extracted.text,
        "First header\n\nSecond header\n\nBody one\nBody two\n\nFooter\n\nA footnote"
    );
}

#[test]
fn docx_without_document_part_is_rejected() {
    let bytes = zip_bytes(&[("word/styles.xml", "<w:styles/>".to_string())]);
    let err = extract_docx_from_reader(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, OfficeError::MissingPart(ref p) if p == "word/document.xml"));
}

#[test]
fn docx_from_path_and_garbage_input() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("memo.docx");
    std::fs::write(
        &good,
        zip_bytes(&[("word/document.xml", word_part("document", &["Memo text"]))]),
    )
    .unwrap();
    assert_eq!(extract_docx(&good).unwrap().text, "Memo text");

    let bad = dir.path().join("bad.docx");
    std::fs::write(&bad, b"not a zip at all").unwrap();
    assert!(matches!(extract_docx(&bad), Err(OfficeError::Zip(_))));
}

fn presentation() -> Vec<(&'static str, String)> {
    vec![
        (
            "ppt/presentation.xml",
            r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId7"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst></p:presentation>"#
                .to_string(),
        ),
        (
            "ppt/_rels/presentation.xml.rels",
            rels(&[
                ("rId3", SLIDE_REL, "slides/slide1.xml"),
                ("rId7", SLIDE_REL, "slides/slide2.xml"),
            ]),
        ),
        ("ppt/slides/slide1.xml", slide_xml(&["Closing", "Thanks"])),
        ("ppt/slides/slide2.xml", slide_xml(&["Opening title", "Agenda"])),
        (
            "ppt/slides/_rels/slide2.xml.rels",
            rels(&[("rId1", NOTES_REL, "../notesSlides/notesSlide1.xml")]),
        ),
        ("ppt/notesSlides/notesSlide1.xml", slide_xml(&["Speaker reminder"])),
    ]
}

#[test]
fn pptx_follows_slide_list_and_includes_notes() {
    let bytes = zip_bytes(&presentation());
    let extracted = extract_pptx_from_reader(Cursor::new(bytes), &PptxOptions::default()).unwrap();

    assert_eq!(extracted.format, Format::Pptx);
    assert_eq!(extracted.pages, Some(2));
    assert_eq!(
        extracted.text,
        "Opening title\nAgenda\n\nSpeaker reminder\n\nClosing\nThanks"
    );
}

#[test]
fn pptx_notes_can_be_excluded() {
    let bytes = zip_bytes(&presentation());
    let options = PptxOptions {
        include_notes: false,
    };
    let extracted = extract_pptx_from_reader(Cursor::new(bytes), &options).unwrap();
    assert!(!extracted.text.contains("Speaker reminder"));
}

#[test]
fn pptx_without_presentation_part_orders_by_slide_number() {
    let bytes = zip_bytes(&[
        ("ppt/slides/slide10.xml", slide_xml(&["ten"])),
        ("ppt/slides/slide2.xml", slide_xml(&["two"])),
        ("ppt/slides/slide1.xml", slide_xml(&["one"])),
    ]);
    let extracted = extract_pptx_from_reader(Cursor::new(bytes), &PptxOptions::default()).unwrap();
    assert_eq!(extracted.text, "one\n\ntwo\n\nten");
    assert_eq!(extracted.pages, Some(3));
}
