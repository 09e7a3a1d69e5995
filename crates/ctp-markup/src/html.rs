use std::path::Path;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

use ctp_core::{ExtractedText, Format};

use crate::MarkupError;
use crate::encoding::{Confidence, DetectedEncoding, decode_with, detect_encoding};

/// How far into the document a `<meta charset>` declaration is honoured.
const META_SNIFF_LIMIT: usize = 1024;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

const SKIPPED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "object",
];

const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section", "article", "header",
    "footer", "blockquote", "pre", "table", "ul", "ol", "dl", "dt", "dd", "hr", "main", "nav",
    "aside", "figure", "figcaption", "address", "caption",
];

pub fn extract_html(path: &Path) -> Result<ExtractedText, MarkupError> {
    let bytes = std::fs::read(path)?;
    let detected = detect_html_encoding(&bytes);
    let (source, had_errors) = decode_with(&bytes, &detected);

    let mut extracted = ExtractedText::new(html_to_text(&source), Format::Html, "html")
        .with_encoding(detected.encoding.name());
    if had_errors {
        extracted.warnings.push(format!(
            "malformed {} sequences replaced",
            detected.encoding.name()
        ));
    }
    Ok(extracted)
}

/// A BOM, then a charset declared near the top of the document, then the
/// generic detection chain.
pub fn detect_html_encoding(bytes: &[u8]) -> DetectedEncoding {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return DetectedEncoding {
            encoding,
            confidence: Confidence::Bom,
            bom_len,
        };
    }
    if let Some(encoding) = sniff_meta_charset(bytes) {
        return DetectedEncoding {
            encoding,
            confidence: Confidence::Declared,
            bom_len: 0,
        };
    }
    detect_encoding(bytes)
}

/// Find `charset=...` in the first kilobyte, as in `<meta charset="...">`
/// or `<meta http-equiv="Content-Type" content="text/html; charset=...">`.
fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut search = head.as_str();
    while let Some(meta) = search.find("<meta") {
        let rest = &search[meta..];
        let tag = &rest[..rest.find('>').unwrap_or(rest.len())];
        if let Some(pos) = tag.find("charset=") {
            let value = tag[pos + "charset=".len()..]
                .trim_start_matches(['"', '\'', ' '])
                .split(['"', '\'', ' ', ';', '/', '>'])
                .next()
                .unwrap_or("");
            if let Some(encoding) = Encoding::for_label(value.as_bytes()) {
                // A document that was decodable enough to declare UTF-16 in
                // ASCII is not UTF-16
                if encoding == UTF_16LE || encoding == UTF_16BE {
                    return Some(UTF_8);
                }
                return Some(encoding);
            }
        }
        search = &rest[tag.len()..];
    }
    None
}

/// Render an HTML document as plain text.
///
/// The `<title>` becomes the first line. Block elements start and end
/// lines, table cells are tab-separated, list items get a `- ` prefix, and
/// whitespace collapses outside `<pre>`.
pub fn html_to_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let mut renderer = Renderer::default();

    if let Some(title) = document.select(&TITLE).next() {
        let title = title.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if !title.is_empty() {
            renderer.out.push_str(&title);
            renderer.out.push('\n');
        }
    }

    renderer.render(document.root_element());
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    out: String,
    pending_space: bool,
    pre_depth: usize,
}

/// One unit of work for the renderer's explicit stack.
enum Step<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close(&'a str),
}

impl Renderer {
    /// Render `root` and everything under it. The walk keeps its own stack
    /// so nesting depth is bounded by memory, not by the thread stack.
    fn render(&mut self, root: ElementRef<'_>) {
        let mut stack = vec![Step::Open(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Text(text) => self.text(text),
                Step::Close(name) => self.close(name),
                Step::Open(element) => {
                    let name = element.value().name();
                    if !self.open(name) {
                        continue;
                    }
                    stack.push(Step::Close(name));
                    let mark = stack.len();
                    for child in element.children() {
                        match child.value() {
                            Node::Text(text) => stack.push(Step::Text(text)),
                            Node::Element(_) => {
                                if let Some(child) = ElementRef::wrap(child) {
                                    stack.push(Step::Open(child));
                                }
                            }
                            _ => {}
                        }
                    }
                    stack[mark..].reverse();
                }
            }
        }
    }

    /// Handle an opening tag. Returns whether the children should be
    /// rendered.
    fn open(&mut self, name: &str) -> bool {
        if SKIPPED.contains(&name) {
            return false;
        }
        match name {
            "br" => {
                self.trim_spaces();
                self.out.push('\n');
                self.pending_space = false;
                return false;
            }
            "li" => {
                self.line_break();
                self.out.push_str("- ");
            }
            "td" | "th" => {
                self.trim_spaces();
                if !self.out.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\t');
                }
                self.pending_space = false;
            }
            "pre" => {
                self.line_break();
                self.pre_depth += 1;
            }
            _ if BLOCKS.contains(&name) => self.line_break(),
            _ => {}
        }
        true
    }

    fn close(&mut self, name: &str) {
        match name {
            "li" => self.line_break(),
            "pre" => {
                self.pre_depth = self.pre_depth.saturating_sub(1);
                self.line_break();
            }
            _ if BLOCKS.contains(&name) => self.line_break(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.pre_depth > 0 {
            self.out.push_str(text);
            self.pending_space = false;
            return;
        }
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.out.is_empty() && !self.out.ends_with(['\n', '\t', ' '])
            {
                self.out.push(' ');
            }
            self.pending_space = false;
            self.out.push(c);
        }
    }

    fn trim_spaces(&mut self) {
        let len = self.out.trim_end_matches(' ').len();
        self.out.truncate(len);
    }

    fn line_break(&mut self) {
        self.trim_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.pending_space = false;
    }

    /// Trim trailing spaces per line and collapse runs of blank lines.
    fn finish(self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        for line in self.out.lines().map(str::trim_end) {
            if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}
