//! Text normalization applied to extracted document text.
//!
//! Every step is a pure `&str -> String` function; [`clean_text`] runs the
//! enabled steps in a fixed order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Common compound-word suffixes that should keep the hyphen.
static COMPOUND_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "centered",
        "based",
        "driven",
        "aware",
        "oriented",
        "specific",
        "related",
        "dependent",
        "independent",
        "like",
        "free",
        "friendly",
        "rich",
        "poor",
        "scale",
        "level",
        "order",
        "class",
        "type",
        "style",
        "wise",
        "fold",
        "term",
        "time",
        "world",
        "source",
        "domain",
        "made",
        "making",
        "intensive",
        "efficient",
        "sensitive",
        "grained",
        "known",
        "year",
        "old",
        "wide",
    ]
    .into_iter()
    .collect()
});

/// Which normalization steps [`clean_text`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    pub expand_ligatures: bool,
    pub fix_hyphenation: bool,
    pub normalize_unicode: bool,
    pub ascii_only: bool,
    pub join_lines: bool,
    /// Drop lines with fewer words than this (0 keeps everything).
    pub min_line_words: usize,
    pub collapse_whitespace: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            expand_ligatures: true,
            fix_hyphenation: true,
            normalize_unicode: true,
            ascii_only: false,
            join_lines: false,
            min_line_words: 0,
            collapse_whitespace: true,
        }
    }
}

impl CleanOptions {
    /// Only the mandatory control-character pass.
    pub fn none() -> Self {
        Self {
            expand_ligatures: false,
            fix_hyphenation: false,
            normalize_unicode: false,
            ascii_only: false,
            join_lines: false,
            min_line_words: 0,
            collapse_whitespace: false,
        }
    }
}

/// Run the enabled normalization steps over `text`.
///
/// Control characters are always stripped. The result carries no trailing
/// whitespace and ends with a single newline unless it is empty.
pub fn clean_text(text: &str, opts: &CleanOptions) -> String {
    let mut out = strip_control_chars(text);
    if opts.expand_ligatures {
        out = expand_ligatures(&out);
    }
    if opts.normalize_unicode {
        out = normalize_unicode(&out);
    }
    if opts.fix_hyphenation {
        out = fix_hyphenation(&out);
    }
    if opts.ascii_only {
        out = to_ascii(&out);
    }
    if opts.min_line_words > 0 {
        out = drop_short_lines(&out, opts.min_line_words);
    }
    if opts.join_lines {
        out = join_wrapped_lines(&out);
    }
    if opts.collapse_whitespace {
        out = collapse_whitespace(&out);
    }

    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

/// Expand common typographic ligatures found in PDFs.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Remove control characters other than newline and tab, and unify line
/// endings to `\n`.
pub fn strip_control_chars(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|&c| {
            if c == '\n' || c == '\t' {
                return true;
            }
            !(c.is_control() || c == '\u{FEFF}' || c == '\u{FFFD}')
        })
        .collect()
}

/// NFKC-normalize and fold typographic punctuation to ASCII.
pub fn normalize_unicode(text: &str) -> String {
    text.nfkc().map(fold_punctuation).collect()
}

fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        '\u{2022}' | '\u{2023}' | '\u{2043}' => '*',
        _ => c,
    }
}

/// Fix hyphenation from line breaks while preserving compound words.
///
/// - `"detec-\ntion"` → `"detection"` (syllable break)
/// - `"human-\ncentered"` → `"human-centered"` (compound word)
/// - `"GPT-4-\nturbo"` → `"GPT-4-turbo"` (hyphen after a digit is kept)
pub fn fix_hyphenation(text: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| {
        // word-char, hyphen, line break with any non-newline whitespace around
        // it, word
        Regex::new(r"(\w)-[^\S\n]*\n[^\S\n]*(\w+)").unwrap()
    });

    // A pass consumes the word after each break, so chains like
    // "a-\nb-\nc" need more than one.
    let mut current = text.to_string();
    loop {
        let next = RE
            .replace_all(&current, |caps: &regex::Captures| {
                let before = &caps[1];
                let after_word = &caps[2];

                if before.chars().last().is_some_and(|c| c.is_ascii_digit()) {
                    return format!("{}-{}", before, after_word);
                }

                let after_lower = after_word.to_lowercase();
                if COMPOUND_SUFFIXES.contains(after_lower.as_str()) {
                    return format!("{}-{}", before, after_word);
                }

                format!("{}{}", before, after_word)
            })
            .into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Transliterate to ASCII, dropping anything that has no ASCII form.
pub fn to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfd() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        if is_combining_mark(c) {
            continue;
        }
        let replacement = match c {
            'ß' => "ss",
            'æ' => "ae",
            'Æ' => "AE",
            'œ' => "oe",
            'Œ' => "OE",
            'ø' => "o",
            'Ø' => "O",
            'đ' | 'ð' => "d",
            'Đ' | 'Ð' => "D",
            'ł' => "l",
            'Ł' => "L",
            'þ' => "th",
            'Þ' => "TH",
            'ı' => "i",
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => " ",
            '\u{2018}' | '\u{2019}' => "'",
            '\u{201C}' | '\u{201D}' => "\"",
            '\u{2013}' | '\u{2014}' => "-",
            '\u{2026}' => "...",
            '\u{2022}' => "*",
            _ => "",
        };
        out.push_str(replacement);
    }
    out
}

/// Collapse horizontal whitespace, trim lines, and keep at most one blank
/// line between paragraphs.
pub fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !lines.is_empty() {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(collapsed);
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Remove non-blank lines with fewer than `min_words` words.
pub fn drop_short_lines(text: &str, min_words: usize) -> String {
    if min_words == 0 {
        return text.to_string();
    }
    text.lines()
        .filter(|line| {
            let words = line.split_whitespace().count();
            words == 0 || words >= min_words
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join lines within a paragraph; paragraphs are separated by blank lines.
pub fn join_wrapped_lines(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}
