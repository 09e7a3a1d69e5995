use std::path::Path;

use serde::Serialize;

use ctp_core::{ConversionOutcome, ConversionStats, ConversionStatus};

use crate::table::{Align, Table, TableStyle, render};
use crate::{ExportFormat, ReportError};

fn or_dash(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn seconds(outcome: &ConversionOutcome) -> String {
    format!("{:.2}s", outcome.elapsed.as_secs_f64())
}

/// One row per input: File, Format, Status, Backend, Encoding, Pages,
/// Words, Chars, Time.
pub fn outcomes_table(outcomes: &[ConversionOutcome]) -> Table {
    let mut table = Table::new([
        "File", "Format", "Status", "Backend", "Encoding", "Pages", "Words", "Chars", "Time",
    ]);
    for o in outcomes {
        let converted = o.status == ConversionStatus::Converted;
        table.push_row([
            o.source.display().to_string(),
            or_dash(o.format.map(|f| f.label())),
            o.status.describe(),
            or_dash(o.backend.as_deref()),
            or_dash(o.encoding.as_deref()),
            or_dash(o.pages),
            if converted { o.words.to_string() } else { "-".to_string() },
            if converted { o.chars.to_string() } else { "-".to_string() },
            seconds(o),
        ]);
    }
    table
}

/// Totals for a run as a two-column table.
pub fn summary_table(stats: &ConversionStats) -> Table {
    let mut table = Table::new(["Summary", "Count"]).with_align(vec![Align::Left, Align::Right]);
    table.push_row(["Files".to_string(), stats.total.to_string()]);
    table.push_row(["Converted".to_string(), stats.converted.to_string()]);
    table.push_row(["Skipped".to_string(), stats.skipped.to_string()]);
    table.push_row(["Failed".to_string(), stats.failed.to_string()]);
    table.push_row(["Words".to_string(), stats.words.to_string()]);
    table.push_row(["Characters".to_string(), stats.chars.to_string()]);
    table
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generator: &'static str,
    version: &'static str,
    stats: ConversionStats,
    files: Vec<JsonRecord<'a>>,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    source: String,
    output: Option<String>,
    format: Option<&'static str>,
    status: &'static str,
    detail: Option<String>,
    backend: Option<&'a str>,
    encoding: Option<&'a str>,
    pages: Option<usize>,
    words: usize,
    chars: usize,
    elapsed_ms: u64,
    warnings: &'a [String],
}

fn status_detail(status: &ConversionStatus) -> Option<String> {
    match status {
        ConversionStatus::Converted => None,
        ConversionStatus::Skipped(reason) => Some(reason.as_str().to_string()),
        ConversionStatus::Failed(msg) => Some(msg.clone()),
    }
}

fn export_json(outcomes: &[ConversionOutcome]) -> Result<String, ReportError> {
    let report = JsonReport {
        generator: "ctp",
        version: env!("CARGO_PKG_VERSION"),
        stats: ConversionStats::from_outcomes(outcomes),
        files: outcomes
            .iter()
            .map(|o| JsonRecord {
                source: o.source.display().to_string(),
                output: o.output.as_ref().map(|p| p.display().to_string()),
                format: o.format.map(|f| f.label()),
                status: o.status.label(),
                detail: status_detail(&o.status),
                backend: o.backend.as_deref(),
                encoding: o.encoding.as_deref(),
                pages: o.pages,
                words: o.words,
                chars: o.chars,
                elapsed_ms: o.elapsed.as_millis() as u64,
                warnings: &o.warnings,
            })
            .collect(),
    };
    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    Ok(json)
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn export_csv(outcomes: &[ConversionOutcome]) -> String {
    let mut out = String::from(
        "File,Output,Format,Status,Detail,Backend,Encoding,Pages,Words,Chars,Seconds,Warnings\n",
    );
    for o in outcomes {
        let output = o
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{:.3},{}\n",
            csv_escape(&o.source.display().to_string()),
            csv_escape(&output),
            o.format.map(|f| f.label()).unwrap_or(""),
            o.status.label(),
            csv_escape(&status_detail(&o.status).unwrap_or_default()),
            csv_escape(o.backend.as_deref().unwrap_or("")),
            csv_escape(o.encoding.as_deref().unwrap_or("")),
            o.pages.map(|p| p.to_string()).unwrap_or_default(),
            o.words,
            o.chars,
            o.elapsed.as_secs_f64(),
            csv_escape(&o.warnings.join("; ")),
        ));
    }
    out
}

fn warnings_of(outcomes: &[ConversionOutcome]) -> Vec<(String, &str)> {
    outcomes
        .iter()
        .flat_map(|o| {
            o.warnings
                .iter()
                .map(move |w| (o.source.display().to_string(), w.as_str()))
        })
        .collect()
}

fn export_markdown(outcomes: &[ConversionOutcome]) -> String {
    let stats = ConversionStats::from_outcomes(outcomes);
    let mut out = String::from("# Conversion Report\n\n");
    out.push_str(&render(&outcomes_table(outcomes), TableStyle::Pipe));
    out.push_str("\n## Summary\n\n");
    out.push_str(&render(&summary_table(&stats), TableStyle::Pipe));

    let warnings = warnings_of(outcomes);
    if !warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for (source, warning) in warnings {
            out.push_str(&format!("- `{}`: {}\n", source, warning));
        }
    }
    out
}

fn export_text(outcomes: &[ConversionOutcome]) -> String {
    let stats = ConversionStats::from_outcomes(outcomes);
    let mut out = String::from("Conversion Report\n");
    out.push_str(&"=".repeat(60));
    out.push_str("\n\n");
    out.push_str(&render(&outcomes_table(outcomes), TableStyle::Simple));
    out.push('\n');
    out.push_str(&format!(
        "{} files | {} converted | {} skipped | {} failed | {} words | {} chars\n",
        stats.total, stats.converted, stats.skipped, stats.failed, stats.words, stats.chars,
    ));

    let warnings = warnings_of(outcomes);
    if !warnings.is_empty() {
        out.push_str("\nWarnings\n");
        out.push_str(&"-".repeat(8));
        out.push('\n');
        for (source, warning) in warnings {
            out.push_str(&format!("  {}: {}\n", source, warning));
        }
    }
    out
}

/// Render a report for a batch of outcomes.
pub fn render_report(
    outcomes: &[ConversionOutcome],
    format: ExportFormat,
) -> Result<String, ReportError> {
    let content = match format {
        ExportFormat::Json => export_json(outcomes)?,
        ExportFormat::Csv => export_csv(outcomes),
        ExportFormat::Markdown => export_markdown(outcomes),
        ExportFormat::Text => export_text(outcomes),
    };
    Ok(content)
}

/// Render a report and write it to `path`, creating parent directories.
pub fn export_report(
    outcomes: &[ConversionOutcome],
    format: ExportFormat,
    path: &Path,
) -> Result<(), ReportError> {
    let content = render_report(outcomes, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), format = format.label(), "report written");
    Ok(())
}
