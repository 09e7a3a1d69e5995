use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use ctp_core::{ExtractedText, Format};

use crate::MarkupError;

/// Destinations whose content is never document text.
const IGNORED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "colorschememapping",
    "datastore",
    "latentstyles",
    "fldinst",
    "filetbl",
    "revtbl",
    "mmathPr",
];

pub fn extract_rtf(path: &Path) -> Result<ExtractedText, MarkupError> {
    let bytes = std::fs::read(path)?;

    // RTF is 7-bit, but some writers emit raw 8-bit text in the document
    // code page
    let source = match std::str::from_utf8(&bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let encoding = sniff_codepage(&bytes).unwrap_or(WINDOWS_1252);
            encoding.decode_without_bom_handling(&bytes).0.into_owned()
        }
    };

    let text = rtf_to_text(&source)?;
    Ok(ExtractedText::new(text, Format::Rtf, "rtf"))
}

/// Strip RTF markup, keeping the document text.
pub fn rtf_to_text(source: &str) -> Result<String, MarkupError> {
    if !source.trim_start().starts_with("{\\rtf") {
        return Err(MarkupError::NotRtf);
    }
    let mut parser = Parser::new(source.trim_start());
    parser.run();
    Ok(parser.finish())
}

fn sniff_codepage(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(512)];
    let pos = head.windows(8).position(|w| w == b"\\ansicpg")?;
    let digits: String = head[pos + 8..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    codepage_encoding(digits.parse().ok()?)
}

/// Map a Windows code page number to an encoding.
fn codepage_encoding(codepage: i32) -> Option<&'static Encoding> {
    let label = match codepage {
        65001 => return Some(UTF_8),
        874 => "windows-874".to_string(),
        932 => "shift_jis".to_string(),
        936 => "gbk".to_string(),
        949 => "euc-kr".to_string(),
        950 => "big5".to_string(),
        10000 => "macintosh".to_string(),
        1250..=1258 => format!("windows-{}", codepage),
        _ => return None,
    };
    Encoding::for_label(label.as_bytes())
}

#[derive(Debug, Clone, Copy)]
struct Group {
    skip: bool,
    /// Fallback characters following each `\uN`.
    uc: usize,
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    out: String,
    current: Group,
    stack: Vec<Group>,
    /// True right after `{`, until the first token of the group.
    group_start: bool,
    codepage: &'static Encoding,
    /// `\'hh` bytes awaiting decoding; multi-byte code pages need them together.
    pending_bytes: Vec<u8>,
    skip_fallback: usize,
    high_surrogate: Option<u32>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            out: String::new(),
            current: Group { skip: false, uc: 1 },
            stack: Vec::new(),
            group_start: false,
            codepage: WINDOWS_1252,
            pending_bytes: Vec::new(),
            skip_fallback: 0,
            high_surrogate: None,
        }
    }

    fn run(&mut self) {
        while let Some(c) = self.chars.next() {
            match c {
                '{' => {
                    self.flush_bytes();
                    self.stack.push(self.current);
                    self.group_start = true;
                    self.skip_fallback = 0;
                }
                '}' => {
                    self.flush_bytes();
                    if let Some(group) = self.stack.pop() {
                        self.current = group;
                    }
                    self.group_start = false;
                    self.skip_fallback = 0;
                }
                '\\' => {
                    self.control();
                    self.group_start = false;
                }
                '\r' | '\n' => {}
                _ => {
                    self.flush_bytes();
                    self.group_start = false;
                    self.emit_fallback_aware(c);
                }
            }
        }
        self.flush_bytes();
    }

    fn control(&mut self) {
        let Some(&next) = self.chars.peek() else {
            return;
        };

        if next.is_ascii_alphabetic() {
            let (word, param) = self.control_word();
            self.flush_bytes();
            self.control_word_action(&word, param);
            return;
        }

        self.chars.next();
        if next != '\'' {
            self.flush_bytes();
        }
        match next {
            '\'' => {
                let hex: String = self.chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    if self.skip_fallback > 0 {
                        self.skip_fallback -= 1;
                    } else if !self.current.skip {
                        self.pending_bytes.push(byte);
                    }
                }
            }
            '*' => self.current.skip = true,
            '\\' | '{' | '}' => self.emit_fallback_aware(next),
            '~' => self.emit('\u{a0}'),
            '_' => self.emit('-'),
            '\r' | '\n' => self.emit('\n'),
            _ => {}
        }
    }

    /// Read a control word and its optional signed parameter. A single
    /// space after it is part of the delimiter.
    fn control_word(&mut self) -> (String, Option<i32>) {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            word.push(c);
            self.chars.next();
        }

        let mut digits = String::new();
        if self.chars.peek() == Some(&'-') {
            digits.push('-');
            self.chars.next();
        }
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }

        if self.chars.peek() == Some(&' ') {
            self.chars.next();
        }
        (word, digits.parse().ok())
    }

    fn control_word_action(&mut self, word: &str, param: Option<i32>) {
        if self.group_start && IGNORED_DESTINATIONS.contains(&word) {
            self.current.skip = true;
            return;
        }

        match word {
            "par" | "line" | "sect" | "page" | "row" => self.emit('\n'),
            "tab" | "cell" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201C}'),
            "rdblquote" => self.emit('\u{201D}'),
            "ansicpg" => {
                if let Some(encoding) = param.and_then(codepage_encoding) {
                    self.codepage = encoding;
                }
            }
            "uc" => self.current.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(n) = param {
                    let unit = if n < 0 { n + 65536 } else { n };
                    self.unicode(unit as u32);
                    self.skip_fallback = self.current.uc;
                }
            }
            "bin" => {
                // Stops at the end of input whatever the declared length
                let n = param.unwrap_or(0).max(0) as usize;
                self.chars.by_ref().take(n).for_each(drop);
            }
            _ => {}
        }
    }

    fn unicode(&mut self, unit: u32) {
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                    self.emit(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
            }
            _ => {
                self.high_surrogate = None;
                self.emit(char::from_u32(unit).unwrap_or('\u{FFFD}'));
            }
        }
    }

    fn emit_fallback_aware(&mut self, c: char) {
        if self.skip_fallback > 0 {
            self.skip_fallback -= 1;
            return;
        }
        self.emit(c);
    }

    fn emit(&mut self, c: char) {
        if !self.current.skip {
            self.out.push(c);
        }
    }

    fn flush_bytes(&mut self) {
        if self.pending_bytes.is_empty() {
            return;
        }
        let (text, _) = self.codepage.decode_without_bom_handling(&self.pending_bytes);
        self.out.push_str(&text);
        self.pending_bytes.clear();
    }

    fn finish(self) -> String {
        self.out.trim_matches(['\n', ' ']).to_string()
    }
}
