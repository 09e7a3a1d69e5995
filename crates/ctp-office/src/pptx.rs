use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use ctp_core::{ExtractedText, Format};

use crate::OfficeError;
use crate::ooxml::{
    TextBuilder, numbered_parts, parent_dir, parse_relationships, read_part, rels_path_for,
    resolve_target,
};

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Placeholder types whose text is boilerplate (slide numbers, dates,
/// footers, the notes page thumbnail).
const SKIPPED_PLACEHOLDERS: &[&str] = &["sldNum", "dt", "ftr", "hdr", "sldImg"];

#[derive(Debug, Clone)]
pub struct PptxOptions {
    /// Append each slide's speaker notes after the slide text.
    pub include_notes: bool,
}

impl Default for PptxOptions {
    fn default() -> Self {
        Self {
            include_notes: true,
        }
    }
}

pub fn extract_pptx(path: &Path, options: &PptxOptions) -> Result<ExtractedText, OfficeError> {
    let file = File::open(path)?;
    extract_pptx_from_reader(BufReader::new(file), options)
}

/// Extract the text of every slide, in presentation order.
pub fn extract_pptx_from_reader<R: Read + Seek>(
    reader: R,
    options: &PptxOptions,
) -> Result<ExtractedText, OfficeError> {
    let mut archive = ZipArchive::new(reader)?;
    let slide_paths = slide_order(&mut archive)?;

    let mut slides = Vec::with_capacity(slide_paths.len());
    for slide_path in &slide_paths {
        let Some(xml) = read_part(&mut archive, slide_path)? else {
            tracing::debug!(part = %slide_path, "slide referenced but missing from archive");
            continue;
        };
        let mut text = shapes_to_text(extract_shapes(&xml)?);

        if options.include_notes
            && let Some(notes) = notes_for_slide(&mut archive, slide_path)?
            && !notes.is_empty()
        {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&notes);
        }
        slides.push(text);
    }

    let slide_count = slides.len();
    let text = slides
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(ExtractedText::new(text, Format::Pptx, "pptx").with_pages(slide_count))
}

/// Slide part names in presentation order.
///
/// The order is `p:sldIdLst` in `presentation.xml`, resolved through the
/// presentation relationships. Without those parts, slides are ordered by
/// the number in `slideN.xml`.
fn slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>, OfficeError> {
    let presentation = read_part(archive, PRESENTATION_PART)?;
    let rels = read_part(archive, &rels_path_for(PRESENTATION_PART))?;

    if let (Some(presentation), Some(rels)) = (presentation, rels) {
        let targets: HashMap<String, String> = parse_relationships(&rels)?
            .into_iter()
            .filter(|r| r.rel_type.ends_with("/slide"))
            .map(|r| (r.id, resolve_target(parent_dir(PRESENTATION_PART), &r.target)))
            .collect();

        let ordered: Vec<String> = slide_ids(&presentation)?
            .iter()
            .filter_map(|id| targets.get(id).cloned())
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }

    tracing::debug!("no usable slide list, ordering slides by part name");
    Ok(numbered_parts(archive, "ppt/slides/slide", ".xml"))
}

/// Relationship ids of `p:sldId` entries, in document order.
fn slide_ids(presentation_xml: &str) -> Result<Vec<String>, OfficeError> {
    let mut reader = Reader::from_str(presentation_xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sldId" => {
                // The unprefixed `id` is the numeric slide id; `r:id` is the relationship
                for attr in e.attributes().flatten() {
                    if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        ids.push(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

fn notes_for_slide<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    slide_path: &str,
) -> Result<Option<String>, OfficeError> {
    let Some(rels) = read_part(archive, &rels_path_for(slide_path))? else {
        return Ok(None);
    };
    let Some(notes_rel) = parse_relationships(&rels)?
        .into_iter()
        .find(|r| r.rel_type.ends_with("/notesSlide"))
    else {
        return Ok(None);
    };

    let notes_path = resolve_target(parent_dir(slide_path), &notes_rel.target);
    match read_part(archive, &notes_path)? {
        Some(xml) => Ok(Some(shapes_to_text(extract_shapes(&xml)?))),
        None => Ok(None),
    }
}

/// A text-bearing shape and its offset on the slide, in EMU.
#[derive(Debug, Default)]
struct Shape {
    text: String,
    x: i64,
    y: i64,
    has_offset: bool,
    placeholder: Option<String>,
}

fn shapes_to_text(mut shapes: Vec<Shape>) -> String {
    shapes.retain(|s| {
        !s.text.is_empty()
            && !s
                .placeholder
                .as_deref()
                .is_some_and(|p| SKIPPED_PLACEHOLDERS.contains(&p))
    });
    // Stable sort keeps document order for shapes that share a position
    shapes.sort_by_key(|s| (s.y, s.x));
    shapes
        .into_iter()
        .map(|s| s.text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn set_offset(shape: &mut Shape, e: &BytesStart) {
    if shape.has_offset {
        return;
    }
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"x" => shape.x = value.parse().unwrap_or(0),
            b"y" => shape.y = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    shape.has_offset = true;
}

/// The `a:xfrm` of a group shape: children are laid out in the `chOff` /
/// `chExt` frame and drawn into the group's `off` / `ext` box.
#[derive(Debug, Default)]
struct GroupTransform {
    off: Option<(i64, i64)>,
    ext: Option<(i64, i64)>,
    ch_off: Option<(i64, i64)>,
    ch_ext: Option<(i64, i64)>,
}

impl GroupTransform {
    fn set(&mut self, name: &[u8], e: &BytesStart) {
        const POINT: [&[u8]; 2] = [b"x", b"y"];
        const SIZE: [&[u8]; 2] = [b"cx", b"cy"];
        let (slot, keys) = match name {
            b"off" => (&mut self.off, POINT),
            b"ext" => (&mut self.ext, SIZE),
            b"chOff" => (&mut self.ch_off, POINT),
            b"chExt" => (&mut self.ch_ext, SIZE),
            _ => return,
        };
        if slot.is_some() {
            return;
        }
        let mut first = None;
        let mut second = None;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).parse::<i64>().ok();
            if attr.key.as_ref() == keys[0] {
                first = value;
            } else if attr.key.as_ref() == keys[1] {
                second = value;
            }
        }
        if let (Some(a), Some(b)) = (first, second) {
            *slot = Some((a, b));
        }
    }

    /// Map a point from the group's child frame to its parent frame.
    fn apply(&self, x: i64, y: i64) -> (i64, i64) {
        let (off_x, off_y) = self.off.unwrap_or((0, 0));
        let (ch_x, ch_y) = self.ch_off.unwrap_or((0, 0));
        let (ext_x, ext_y) = self.ext.unwrap_or((0, 0));
        let (ch_ext_x, ch_ext_y) = self.ch_ext.unwrap_or((0, 0));
        (
            map_axis(x, off_x, ch_x, ext_x, ch_ext_x),
            map_axis(y, off_y, ch_y, ext_y, ch_ext_y),
        )
    }
}

fn map_axis(value: i64, off: i64, ch_off: i64, ext: i64, ch_ext: i64) -> i64 {
    let delta = i128::from(value) - i128::from(ch_off);
    let scaled = if ext > 0 && ch_ext > 0 {
        delta * i128::from(ext) / i128::from(ch_ext)
    } else {
        delta
    };
    (i128::from(off) + scaled).clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn set_placeholder(shape: &mut Shape, e: &BytesStart) {
    let kind = e
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"type")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned());
    // A placeholder without a type is a body placeholder
    shape.placeholder = Some(kind.unwrap_or_else(|| "body".to_string()));
}

/// Collect shapes (`p:sp`, `p:graphicFrame`) with their text and their
/// offsets in slide coordinates. Shapes inside groups (`p:grpSp`) are mapped
/// out through each enclosing group's transform.
fn extract_shapes(xml: &str) -> Result<Vec<Shape>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();

    let mut current: Option<(Shape, TextBuilder)> = None;
    let mut in_text = false;
    let mut groups: Vec<GroupTransform> = Vec::new();
    let mut in_group_props = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if current.is_none() => match e.local_name().as_ref() {
                b"sp" | b"graphicFrame" => current = Some((Shape::default(), TextBuilder::default())),
                b"grpSp" => groups.push(GroupTransform::default()),
                b"grpSpPr" => in_group_props = !groups.is_empty(),
                name if in_group_props => {
                    if let Some(group) = groups.last_mut() {
                        group.set(name, e);
                    }
                }
                _ => {}
            },
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"off" => {
                    if let Some((shape, _)) = current.as_mut() {
                        set_offset(shape, e);
                    }
                }
                b"t" => in_text = true,
                b"tc" => {
                    if let Some((_, text)) = current.as_mut() {
                        text.start_cell();
                    }
                }
                _ => {}
            },
            Event::Empty(ref e) => {
                let Some((shape, text)) = current.as_mut() else {
                    if in_group_props && let Some(group) = groups.last_mut() {
                        group.set(e.local_name().as_ref(), e);
                    }
                    continue;
                };
                match e.local_name().as_ref() {
                    b"off" => set_offset(shape, e),
                    b"ph" => set_placeholder(shape, e),
                    b"br" => text.push('\n'),
                    _ => {}
                }
            }
            Event::Text(ref e) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some((_, text)) = current.as_mut() {
                        text.end_paragraph();
                    }
                }
                b"tc" => {
                    if let Some((_, text)) = current.as_mut() {
                        text.end_cell();
                    }
                }
                b"tr" => {
                    if let Some((_, text)) = current.as_mut() {
                        text.end_row();
                    }
                }
                b"sp" | b"graphicFrame" => {
                    if let Some((mut shape, text)) = current.take() {
                        shape.text = text.finish().trim().to_string();
                        for group in groups.iter().rev() {
                            (shape.x, shape.y) = group.apply(shape.x, shape.y);
                        }
                        shapes.push(shape);
                    }
                }
                b"grpSpPr" => in_group_props = false,
                b"grpSp" if current.is_none() => {
                    groups.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}
