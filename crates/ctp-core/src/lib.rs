use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config_file;
pub mod text;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use config_file::{ConfigError, ConfigFile};
pub use text::{CleanOptions, clean_text};

/// A document format the processor knows how to turn into plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Pptx,
    Rtf,
    Html,
    Text,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Pdf,
        Format::Docx,
        Format::Pptx,
        Format::Rtf,
        Format::Html,
        Format::Text,
    ];

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Format> {
        let lower = ext.to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&lower.as_str()))
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Format::from_extension)
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Format::Pdf => &["pdf"],
            Format::Docx => &["docx"],
            Format::Pptx => &["pptx"],
            Format::Rtf => &["rtf"],
            Format::Html => &["html", "htm", "xhtml"],
            Format::Text => &["txt", "text", "md", "csv"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Pptx => "pptx",
            Format::Rtf => "rtf",
            Format::Html => "html",
            Format::Text => "text",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Format::Pdf => "Portable Document Format",
            Format::Docx => "Word document (Office Open XML)",
            Format::Pptx => "PowerPoint presentation (Office Open XML)",
            Format::Rtf => "Rich Text Format",
            Format::Html => "HTML page",
            Format::Text => "Plain text (any encoding)",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which PDF backend(s) to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfBackendChoice {
    /// MuPDF first, lopdf as fallback.
    #[default]
    Auto,
    Mupdf,
    Lopdf,
}

impl FromStr for PdfBackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PdfBackendChoice::Auto),
            "mupdf" => Ok(PdfBackendChoice::Mupdf),
            "lopdf" => Ok(PdfBackendChoice::Lopdf),
            other => Err(format!(
                "unknown PDF backend '{}' (expected auto, mupdf or lopdf)",
                other
            )),
        }
    }
}

/// Text extracted from a single document, plus what we learned along the way.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub format: Format,
    /// Name of the extractor that produced `text` (e.g. "mupdf", "docx").
    pub backend: String,
    /// WHATWG name of the source encoding, for byte-oriented formats.
    pub encoding: Option<String>,
    /// Pages for PDFs, slides for presentations.
    pub pages: Option<usize>,
    pub warnings: Vec<String>,
}

impl ExtractedText {
    pub fn new(text: String, format: Format, backend: impl Into<String>) -> Self {
        Self {
            text,
            format,
            backend: backend.into(),
            encoding: None,
            pages: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Why a file was not converted, without it being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedFormat,
    OutputExists,
    EmptyText,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnsupportedFormat => "unsupported format",
            SkipReason::OutputExists => "output exists",
            SkipReason::EmptyText => "no text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Converted,
    Skipped(SkipReason),
    Failed(String),
}

impl ConversionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConversionStatus::Converted => "converted",
            ConversionStatus::Skipped(_) => "skipped",
            ConversionStatus::Failed(_) => "failed",
        }
    }

    /// Status plus detail, e.g. `skipped (output exists)`.
    pub fn describe(&self) -> String {
        match self {
            ConversionStatus::Converted => "converted".to_string(),
            ConversionStatus::Skipped(reason) => format!("skipped ({})", reason.as_str()),
            ConversionStatus::Failed(msg) => format!("failed: {}", msg),
        }
    }
}

/// The result of converting one input file.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<Format>,
    pub status: ConversionStatus,
    pub backend: Option<String>,
    pub encoding: Option<String>,
    pub chars: usize,
    pub words: usize,
    pub pages: Option<usize>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ConversionOutcome {
    /// An outcome with no extraction data attached.
    pub fn bare(source: PathBuf, status: ConversionStatus) -> Self {
        Self {
            source,
            output: None,
            format: None,
            status,
            backend: None,
            encoding: None,
            chars: 0,
            words: 0,
            pages: None,
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ConversionStatus::Failed(_))
    }
}

/// Aggregate counts over a batch of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chars: usize,
    pub words: usize,
}

impl ConversionStats {
    pub fn from_outcomes(outcomes: &[ConversionOutcome]) -> Self {
        let mut stats = ConversionStats {
            total: outcomes.len(),
            ..Default::default()
        };
        for o in outcomes {
            match o.status {
                ConversionStatus::Converted => {
                    stats.converted += 1;
                    stats.chars += o.chars;
                    stats.words += o.words;
                }
                ConversionStatus::Skipped(_) => stats.skipped += 1,
                ConversionStatus::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Progress events emitted while a batch is converted.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Finished {
        index: usize,
        total: usize,
        outcome: Box<ConversionOutcome>,
    },
    Warning {
        path: PathBuf,
        message: String,
    },
}

/// Resolved runtime configuration. Built from defaults, then the config
/// file, then CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub output_extension: String,
    pub overwrite: bool,
    pub preserve_tree: bool,
    /// `None` writes extracted text untouched.
    pub clean: Option<CleanOptions>,
    pub pdf_backend: PdfBackendChoice,
    pub header_ratio: f32,
    pub footer_ratio: f32,
    pub min_chars_per_page: usize,
    pub num_workers: usize,
    pub max_archive_size_mb: u64,
    pub recursive: bool,
    pub include_hidden: bool,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            output_extension: "txt".to_string(),
            overwrite: false,
            preserve_tree: true,
            clean: Some(CleanOptions::default()),
            pdf_backend: PdfBackendChoice::Auto,
            header_ratio: 0.0,
            footer_ratio: 0.0,
            min_chars_per_page: 20,
            num_workers: cpus.min(8),
            max_archive_size_mb: 500,
            recursive: true,
            include_hidden: false,
        }
    }
}

impl Config {
    /// Apply config-file values on top of the defaults.
    pub fn from_file(file: &ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref output) = file.output {
            if let Some(ref ext) = output.extension {
                let ext = ext.trim().trim_start_matches('.');
                if ext.is_empty() {
                    return Err(ConfigError::Invalid(
                        "output.extension must not be empty".into(),
                    ));
                }
                config.output_extension = ext.to_string();
            }
            if let Some(v) = output.overwrite {
                config.overwrite = v;
            }
            if let Some(v) = output.preserve_tree {
                config.preserve_tree = v;
            }
        }

        if let Some(ref cleaning) = file.cleaning {
            if cleaning.enabled == Some(false) {
                config.clean = None;
            } else {
                let mut opts = CleanOptions::default();
                if let Some(v) = cleaning.ascii_only {
                    opts.ascii_only = v;
                }
                if let Some(v) = cleaning.join_lines {
                    opts.join_lines = v;
                }
                if let Some(v) = cleaning.min_line_words {
                    opts.min_line_words = v;
                }
                if let Some(v) = cleaning.fix_hyphenation {
                    opts.fix_hyphenation = v;
                }
                config.clean = Some(opts);
            }
        }

        if let Some(ref pdf) = file.pdf {
            if let Some(ref backend) = pdf.backend {
                config.pdf_backend = backend.parse().map_err(ConfigError::Invalid)?;
            }
            if let Some(r) = pdf.header_ratio {
                config.header_ratio = check_ratio("pdf.header_ratio", r)?;
            }
            if let Some(r) = pdf.footer_ratio {
                config.footer_ratio = check_ratio("pdf.footer_ratio", r)?;
            }
            if let Some(n) = pdf.min_chars_per_page {
                config.min_chars_per_page = n;
            }
        }

        if let Some(ref conc) = file.concurrency {
            if let Some(n) = conc.num_workers {
                if n == 0 {
                    return Err(ConfigError::Invalid(
                        "concurrency.num_workers must be at least 1".into(),
                    ));
                }
                config.num_workers = n;
            }
            if let Some(mb) = conc.max_archive_size_mb {
                config.max_archive_size_mb = mb;
            }
        }

        if let Some(ref input) = file.input {
            if let Some(v) = input.recursive {
                config.recursive = v;
            }
            if let Some(v) = input.include_hidden {
                config.include_hidden = v;
            }
        }

        Ok(config)
    }
}

fn check_ratio(key: &str, value: f32) -> Result<f32, ConfigError> {
    if (0.0..0.5).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be in [0.0, 0.5), got {}",
            key, value
        )))
    }
}
