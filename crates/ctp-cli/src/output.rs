use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use ctp_core::{ConversionOutcome, ConversionStats, ConversionStatus, ExtractedText, Format};
use ctp_reporting::{Table, TableStyle, outcomes_table, render};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    /// Color unless disabled by flag, by `NO_COLOR`, or because stdout is
    /// not a terminal.
    pub fn detect(no_color: bool) -> Self {
        let env_off = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        ColorMode(!no_color && !env_off && std::io::stdout().is_terminal())
    }

    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub fn print_warning(
    w: &mut dyn Write,
    path: &Path,
    message: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}: {}", "WARNING:".yellow(), path.display(), message)
    } else {
        writeln!(w, "WARNING: {}: {}", path.display(), message)
    }
}

/// Print the per-file outcome table.
pub fn print_outcomes(
    w: &mut dyn Write,
    outcomes: &[ConversionOutcome],
    style: TableStyle,
) -> std::io::Result<()> {
    if outcomes.is_empty() {
        return Ok(());
    }
    write!(w, "{}", render(&outcomes_table(outcomes), style))
}

/// Print every failed file with its error.
pub fn print_failures(
    w: &mut dyn Write,
    outcomes: &[ConversionOutcome],
    color: ColorMode,
) -> std::io::Result<()> {
    let failed: Vec<&ConversionOutcome> = outcomes.iter().filter(|o| o.is_failure()).collect();
    if failed.is_empty() {
        return Ok(());
    }

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Failed files:".bold().red())?;
    } else {
        writeln!(w, "Failed files:")?;
    }
    for o in failed {
        let ConversionStatus::Failed(ref msg) = o.status else {
            continue;
        };
        if color.enabled() {
            writeln!(w, "  {} {}", o.source.display().bold(), msg.red())?;
        } else {
            writeln!(w, "  {} {}", o.source.display(), msg)?;
        }
    }
    Ok(())
}

/// Print the run summary.
pub fn print_summary(
    w: &mut dyn Write,
    stats: &ConversionStats,
    elapsed: Duration,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Files: {}", stats.total)?;
    if color.enabled() {
        writeln!(w, "  Converted: {}", stats.converted.to_string().green())?;
    } else {
        writeln!(w, "  Converted: {}", stats.converted)?;
    }
    if stats.skipped > 0 {
        if color.enabled() {
            writeln!(w, "  Skipped: {}", stats.skipped.to_string().yellow())?;
        } else {
            writeln!(w, "  Skipped: {}", stats.skipped)?;
        }
    }
    if stats.failed > 0 {
        if color.enabled() {
            writeln!(w, "  Failed: {}", stats.failed.to_string().red())?;
        } else {
            writeln!(w, "  Failed: {}", stats.failed)?;
        }
    }
    writeln!(w, "  Words: {}", stats.words)?;
    writeln!(w, "  Characters: {}", stats.chars)?;
    writeln!(w, "  Time: {:.1}s", elapsed.as_secs_f64())?;
    Ok(())
}

/// First `max` characters of `s`, with `...` if anything was cut.
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Print what `ctp inspect` found for one file.
pub fn print_inspection(
    w: &mut dyn Write,
    path: &Path,
    extracted: &ExtractedText,
    text: &str,
    preview: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "INSPECT:".bold().cyan(), path.display().bold())?;
    } else {
        writeln!(w, "INSPECT: {}", path.display())?;
    }
    writeln!(
        w,
        "  Format:   {} ({})",
        extracted.format,
        extracted.format.description()
    )?;
    writeln!(w, "  Backend:  {}", extracted.backend)?;
    if let Some(ref encoding) = extracted.encoding {
        writeln!(w, "  Encoding: {}", encoding)?;
    }
    if let Some(pages) = extracted.pages {
        writeln!(w, "  Pages:    {}", pages)?;
    }
    writeln!(w, "  Words:    {}", text.split_whitespace().count())?;
    writeln!(w, "  Chars:    {}", text.chars().count())?;

    for warning in &extracted.warnings {
        if color.enabled() {
            writeln!(w, "  {} {}", "WARNING:".yellow(), warning)?;
        } else {
            writeln!(w, "  WARNING: {}", warning)?;
        }
    }

    if preview > 0 {
        writeln!(w)?;
        let shown = truncate(text.trim_end(), preview);
        if shown.is_empty() {
            writeln!(w, "(no text)")?;
        } else if color.enabled() {
            writeln!(w, "{}", shown.dimmed())?;
        } else {
            writeln!(w, "{}", shown)?;
        }
    }
    Ok(())
}

/// Supported formats with their extensions and extraction backends.
pub fn formats_table(pdf_backends: &[&str]) -> Table {
    let mut table = Table::new(["Format", "Extensions", "Backends", "Description"]);
    for format in Format::ALL {
        let backends = match format {
            Format::Pdf => pdf_backends.join(", "),
            other => other.label().to_string(),
        };
        table.push_row([
            format.label().to_string(),
            format
                .extensions()
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(" "),
            backends,
            format.description().to_string(),
        ]);
    }
    table
}

/// Comma-separated names accepted by `--table-style`.
pub fn table_style_names() -> String {
    TableStyle::all()
        .iter()
        .map(TableStyle::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
