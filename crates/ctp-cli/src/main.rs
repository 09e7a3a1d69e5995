use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use ctp_core::config_file::{self, ConfigFile};
use ctp_core::{
    CleanOptions, Config, ConversionStats, Format, PdfBackendChoice, ProgressEvent, clean_text,
};
use ctp_ingest::pool::{ConvertOptions, convert_all};
use ctp_ingest::{DiscoverOptions, InputFile, IngestOptions, discover_inputs, extract_text};
use ctp_reporting::{ExportFormat, TableStyle, export_report, render};

mod logging;
mod output;

use output::ColorMode;

/// Fatal error: bad configuration, no inputs, unusable output directory.
const EXIT_FATAL: u8 = 1;
/// The run completed but at least one file failed.
const EXIT_FAILURES: u8 = 3;

/// Corpus Text Processor - extract clean text from PDF, DOCX, PPTX, RTF, HTML and text files
#[derive(Parser, Debug)]
#[command(name = "ctp", version, about, long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). CTP_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Read settings from this TOML file instead of the default locations
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert documents to plain text files
    Convert(ConvertArgs),

    /// Re-clean existing text files (any encoding) into UTF-8
    Clean(CleanArgs),

    /// Show what would be extracted from one file, without writing anything
    Inspect(InspectArgs),

    /// List supported formats and their backends
    Formats {
        /// Table style: plain, simple, grid or pipe
        #[arg(long, default_value = "simple", value_name = "STYLE")]
        table_style: TableStyle,
    },

    /// Print the settings loaded from config files
    Config {
        /// Write them to the user config file instead
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Files, directories or archives (.zip, .tar.gz, .tgz)
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Write extracted text without normalization
    #[arg(long)]
    no_clean: bool,

    #[command(flatten)]
    cleaning: CleaningArgs,

    #[command(flatten)]
    pdf: PdfArgs,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Text files or directories of text files
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    cleaning: CleaningArgs,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// The file to inspect
    file: PathBuf,

    /// Number of characters of text to preview (0 for none)
    #[arg(long, default_value_t = 500, value_name = "N")]
    preview: usize,

    /// Preview the text as extracted, before cleaning
    #[arg(long)]
    raw: bool,

    #[command(flatten)]
    cleaning: CleaningArgs,

    #[command(flatten)]
    pdf: PdfArgs,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Args, Debug, Default)]
struct InputArgs {
    /// Only take files directly inside directory arguments
    #[arg(long)]
    no_recursive: bool,

    /// Include dot-files and dot-directories
    #[arg(long)]
    include_hidden: bool,
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Output directory (default: output.dir from the config file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Write every output directly into the output directory
    #[arg(long)]
    flat: bool,

    /// Extension for output files
    #[arg(long, value_name = "EXT")]
    extension: Option<String>,

    /// Number of files converted in parallel
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

#[derive(Args, Debug, Default)]
struct CleaningArgs {
    /// Transliterate to ASCII
    #[arg(long)]
    ascii: bool,

    /// Join hard-wrapped lines into paragraphs
    #[arg(long)]
    join_lines: bool,

    /// Drop lines with fewer words than this
    #[arg(long, value_name = "N")]
    min_line_words: Option<usize>,
}

#[derive(Args, Debug, Default)]
struct PdfArgs {
    /// PDF extractor: auto, mupdf or lopdf
    #[arg(long, value_name = "BACKEND")]
    pdf_backend: Option<PdfBackendChoice>,

    /// Fraction of each page height ignored at the top (MuPDF only)
    #[arg(long, value_name = "F")]
    header_ratio: Option<f32>,

    /// Fraction of each page height ignored at the bottom (MuPDF only)
    #[arg(long, value_name = "F")]
    footer_ratio: Option<f32>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Write a report of the run to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Report format: json, csv, markdown or text (default: from the report extension)
    #[arg(long, value_name = "FMT")]
    report_format: Option<ExportFormat>,

    /// Table style: plain, simple, grid or pipe
    #[arg(long, default_value = "simple", value_name = "STYLE")]
    table_style: TableStyle,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Print only failures and the summary
    #[arg(short, long)]
    quiet: bool,
}

impl InputArgs {
    fn apply(&self, config: &mut Config) {
        if self.no_recursive {
            config.recursive = false;
        }
        if self.include_hidden {
            config.include_hidden = true;
        }
    }
}

impl OutputArgs {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if self.overwrite {
            config.overwrite = true;
        }
        if self.flat {
            config.preserve_tree = false;
        }
        if let Some(ref ext) = self.extension {
            let ext = ext.trim_start_matches('.');
            if ext.is_empty() {
                bail!("--extension must not be empty");
            }
            config.output_extension = ext.to_string();
        }
        if let Some(n) = self.workers {
            if n == 0 {
                bail!("--workers must be at least 1");
            }
            config.num_workers = n;
        }
        Ok(())
    }

    /// The output directory: the flag, else `output.dir` from the config file.
    fn resolve_dir(&self, file: &ConfigFile) -> anyhow::Result<PathBuf> {
        self.output
            .clone()
            .or_else(|| {
                file.output
                    .as_ref()
                    .and_then(|o| o.dir.as_ref())
                    .map(PathBuf::from)
            })
            .context("no output directory: pass -o/--output or set output.dir in the config file")
    }
}

impl CleaningArgs {
    fn apply(&self, config: &mut Config) {
        if !(self.ascii || self.join_lines || self.min_line_words.is_some()) {
            return;
        }
        let opts = config.clean.get_or_insert_with(CleanOptions::default);
        if self.ascii {
            opts.ascii_only = true;
        }
        if self.join_lines {
            opts.join_lines = true;
        }
        if let Some(n) = self.min_line_words {
            opts.min_line_words = n;
        }
    }
}

impl PdfArgs {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(backend) = self.pdf_backend {
            config.pdf_backend = backend;
        }
        if let Some(r) = self.header_ratio {
            config.header_ratio = check_ratio("--header-ratio", r)?;
        }
        if let Some(r) = self.footer_ratio {
            config.footer_ratio = check_ratio("--footer-ratio", r)?;
        }
        Ok(())
    }
}

fn check_ratio(flag: &str, value: f32) -> anyhow::Result<f32> {
    if !(0.0..0.5).contains(&value) {
        bail!("{} must be in [0.0, 0.5), got {}", flag, value);
    }
    Ok(value)
}

/// Config file values plus environment overrides. Flags are applied later
/// by each subcommand.
fn load_settings(path: Option<&Path>) -> anyhow::Result<(ConfigFile, Config)> {
    let file = match path {
        Some(p) => config_file::try_load_from_path(p)?,
        None => config_file::load_config(),
    };
    let mut config = Config::from_file(&file)?;
    apply_env(
        &mut config,
        std::env::var("CTP_WORKERS").ok(),
        std::env::var("CTP_PDF_BACKEND").ok(),
    )?;
    Ok((file, config))
}

fn apply_env(
    config: &mut Config,
    workers: Option<String>,
    pdf_backend: Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = workers.filter(|v| !v.trim().is_empty()) {
        let n: usize = v
            .trim()
            .parse()
            .with_context(|| format!("CTP_WORKERS must be a positive integer, got '{}'", v))?;
        if n == 0 {
            bail!("CTP_WORKERS must be at least 1");
        }
        config.num_workers = n;
    }
    if let Some(v) = pdf_backend.filter(|v| !v.trim().is_empty()) {
        config.pdf_backend = v.parse().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "fatal error");
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Convert(args) => convert(args, config_path).await,
        Command::Clean(args) => clean(args, config_path).await,
        Command::Inspect(args) => inspect(args, config_path),
        Command::Formats { table_style } => formats(table_style),
        Command::Config { save } => show_config(save, config_path),
    }
}

async fn convert(args: ConvertArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let (file, mut config) = load_settings(config_path)?;
    args.input.apply(&mut config);
    args.output.apply(&mut config)?;
    if args.no_clean {
        config.clean = None;
    } else {
        args.cleaning.apply(&mut config);
    }
    args.pdf.apply(&mut config)?;
    let output_dir = args.output.resolve_dir(&file)?;

    let color = ColorMode::detect(args.run.no_color || args.run.report.is_some());
    let discovery = discover_inputs(
        &args.inputs,
        &DiscoverOptions::from_config(&config).excluding(output_dir.clone()),
    );
    print_discovery_warnings(&discovery.warnings, color);
    if discovery.is_empty() {
        bail!("no input documents found");
    }

    let options = ConvertOptions::from_config(&config, &output_dir);
    run_batch(discovery.files.clone(), options, &args.run, color).await
}

async fn clean(args: CleanArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let (file, mut config) = load_settings(config_path)?;
    args.input.apply(&mut config);
    args.output.apply(&mut config)?;
    if config.clean.is_none() {
        config.clean = Some(CleanOptions::default());
    }
    args.cleaning.apply(&mut config);
    let output_dir = args.output.resolve_dir(&file)?;

    let color = ColorMode::detect(args.run.no_color || args.run.report.is_some());
    let discovery = discover_inputs(
        &args.inputs,
        &DiscoverOptions::from_config(&config).excluding(output_dir.clone()),
    );
    print_discovery_warnings(&discovery.warnings, color);

    let (texts, others): (Vec<InputFile>, Vec<InputFile>) = discovery
        .files
        .iter()
        .cloned()
        .partition(|f| matches!(f.format(), None | Some(Format::Text)));
    for other in &others {
        tracing::info!(input = %other.source.display(), "not a text file, left out");
    }
    if texts.is_empty() {
        bail!("no text files found");
    }

    let options = ConvertOptions::from_config(&config, &output_dir);
    run_batch(texts, options, &args.run, color).await
}

fn print_discovery_warnings(warnings: &[String], color: ColorMode) {
    use owo_colors::OwoColorize;

    for warning in warnings {
        if color.enabled() {
            eprintln!("{} {}", "WARNING:".yellow(), warning);
        } else {
            eprintln!("WARNING: {}", warning);
        }
    }
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Convert `files` with a progress bar, print the results, and write the
/// report if one was requested.
async fn run_batch(
    files: Vec<InputFile>,
    options: ConvertOptions,
    run: &RunArgs,
    color: ColorMode,
) -> anyhow::Result<ExitCode> {
    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "cannot create output directory {}",
            options.output_dir.display()
        )
    })?;

    let bar = if run.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(files.len() as u64)
    };
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} (eta {eta}) {msg}",
        )?
        .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let quiet = run.quiet;
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = {
        let bar = bar.clone();
        Arc::new(move |event: ProgressEvent| match event {
            ProgressEvent::Started { path, .. } => bar.set_message(short_name(&path)),
            ProgressEvent::Warning { path, message } => {
                if !quiet {
                    bar.suspend(|| {
                        let _ = output::print_warning(&mut std::io::stderr(), &path, &message, color);
                    });
                }
            }
            ProgressEvent::Finished { .. } => bar.inc(1),
        })
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    let bar_clone = bar.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            bar_clone.set_message("cancelling...");
            cancel_clone.cancel();
        }
    });

    tracing::info!(
        files = files.len(),
        workers = options.num_workers,
        output = %options.output_dir.display(),
        "starting conversion"
    );
    let start = Instant::now();
    let outcomes = convert_all(files, Arc::new(options), progress, cancel.clone()).await;
    bar.finish_and_clear();

    let stats = ConversionStats::from_outcomes(&outcomes);
    let mut stdout = std::io::stdout().lock();
    if !run.quiet {
        output::print_outcomes(&mut stdout, &outcomes, run.table_style)?;
    }
    output::print_failures(&mut stdout, &outcomes, color)?;
    output::print_summary(&mut stdout, &stats, start.elapsed(), color)?;

    if cancel.is_cancelled() {
        eprintln!("Cancelled: remaining files were not converted");
    }

    if let Some(ref path) = run.report {
        let format = run
            .report_format
            .or_else(|| ExportFormat::from_path(path))
            .unwrap_or(ExportFormat::Text);
        export_report(&outcomes, format, path)
            .with_context(|| format!("cannot write report {}", path.display()))?;
        eprintln!("{} report written to {}", format.label(), path.display());
    }

    Ok(if stats.has_failures() {
        ExitCode::from(EXIT_FAILURES)
    } else {
        ExitCode::SUCCESS
    })
}

fn inspect(args: InspectArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let (_, mut config) = load_settings(config_path)?;
    args.pdf.apply(&mut config)?;
    args.cleaning.apply(&mut config);

    if !args.file.is_file() {
        bail!("File not found: {}", args.file.display());
    }

    let color = ColorMode::detect(args.no_color);
    let extracted = match extract_text(&args.file, &IngestOptions::from_config(&config)) {
        Ok(extracted) => extracted,
        Err(e) => {
            eprintln!("Error: cannot extract {}: {}", args.file.display(), e);
            return Ok(ExitCode::from(EXIT_FAILURES));
        }
    };

    let text = match config.clean {
        Some(ref opts) if !args.raw => clean_text(&extracted.text, opts),
        _ => extracted.text.clone(),
    };

    let mut stdout = std::io::stdout().lock();
    output::print_inspection(
        &mut stdout,
        &args.file,
        &extracted,
        &text,
        args.preview,
        color,
    )?;
    Ok(ExitCode::SUCCESS)
}

fn formats(table_style: TableStyle) -> anyhow::Result<ExitCode> {
    let pipeline = ctp_ingest::pdf_pipeline(&IngestOptions::default())?;
    let table = output::formats_table(&pipeline.backend_names());
    print!("{}", render(&table, table_style));
    println!();
    println!("Table styles: {}", output::table_style_names());
    Ok(ExitCode::SUCCESS)
}

/// Print the merged config file settings, or save them to the platform
/// config path.
fn show_config(save: bool, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let (file, _) = load_settings(config_path)?;
    if save {
        let path = config_file::save_config(&file)?;
        println!("Saved configuration to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let text = config_file::to_toml(&file)?;
    if text.trim().is_empty() {
        println!("# no settings found; built-in defaults apply");
    } else {
        print!("{}", text);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "ctp",
            "-vv",
            "convert",
            "docs",
            "more.zip",
            "-o",
            "out",
            "--flat",
            "--ascii",
            "--pdf-backend",
            "lopdf",
            "--report",
            "run.csv",
            "--table-style",
            "grid",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.inputs, vec![PathBuf::from("docs"), PathBuf::from("more.zip")]);
        assert_eq!(args.output.output, Some(PathBuf::from("out")));
        assert!(args.output.flat);
        assert!(args.cleaning.ascii);
        assert_eq!(args.pdf.pdf_backend, Some(PdfBackendChoice::Lopdf));
        assert_eq!(args.run.table_style, TableStyle::Grid);
        assert_eq!(args.run.report_format, None);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(Cli::try_parse_from(["ctp", "convert", "-o", "out"]).is_err());
        assert!(Cli::try_parse_from(["ctp", "convert", "a", "--pdf-backend", "xpdf"]).is_err());
        assert!(Cli::try_parse_from(["ctp", "formats", "--table-style", "fancy"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        OutputArgs {
            overwrite: true,
            flat: true,
            extension: Some(".text".into()),
            workers: Some(3),
            ..Default::default()
        }
        .apply(&mut config)
        .unwrap();
        assert!(config.overwrite);
        assert!(!config.preserve_tree);
        assert_eq!(config.output_extension, "text");
        assert_eq!(config.num_workers, 3);

        let bad = OutputArgs {
            workers: Some(0),
            ..Default::default()
        };
        assert!(bad.apply(&mut config).is_err());
    }

    #[test]
    fn test_cleaning_flags_enable_cleaning() {
        let mut config = Config {
            clean: None,
            ..Config::default()
        };
        CleaningArgs::default().apply(&mut config);
        assert!(config.clean.is_none());

        CleaningArgs {
            join_lines: true,
            min_line_words: Some(2),
            ..Default::default()
        }
        .apply(&mut config);
        let opts = config.clean.unwrap();
        assert!(opts.join_lines);
        assert_eq!(opts.min_line_words, 2);
        assert!(!opts.ascii_only);
    }

    #[test]
    fn test_pdf_ratios_validated() {
        let mut config = Config::default();
        let args = PdfArgs {
            header_ratio: Some(0.1),
            footer_ratio: Some(0.6),
            ..Default::default()
        };
        assert!(args.apply(&mut config).is_err());
        assert_eq!(config.header_ratio, 0.1);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env(&mut config, Some("6".into()), Some("LOPDF".into())).unwrap();
        assert_eq!(config.num_workers, 6);
        assert_eq!(config.pdf_backend, PdfBackendChoice::Lopdf);

        assert!(apply_env(&mut config, Some("zero".into()), None).is_err());
        assert!(apply_env(&mut config, Some("0".into()), None).is_err());
        assert!(apply_env(&mut config, None, Some("xpdf".into())).is_err());
        apply_env(&mut config, Some(" ".into()), None).unwrap();
        assert_eq!(config.num_workers, 6);
    }

    #[test]
    fn test_output_dir_from_config_file() {
        let args = OutputArgs::default();
        assert!(args.resolve_dir(&ConfigFile::default()).is_err());

        let file: ConfigFile = toml::from_str("[output]\ndir = \"texts\"\n").unwrap();
        assert_eq!(args.resolve_dir(&file).unwrap(), PathBuf::from("texts"));

        let flag = OutputArgs {
            output: Some(PathBuf::from("cli")),
            ..Default::default()
        };
        assert_eq!(flag.resolve_dir(&file).unwrap(), PathBuf::from("cli"));
    }
}
