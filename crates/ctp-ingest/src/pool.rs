//! Worker pool for batch conversion.
//!
//! Jobs go through a shared `async_channel` queue to `num_workers` tokio
//! tasks. Each worker runs the (blocking) extraction on the blocking thread
//! pool and answers through the job's oneshot sender, so callers can
//! collect results in submission order regardless of completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ctp_core::{
    CleanOptions, Config, ConversionOutcome, ConversionStats, ConversionStatus, ProgressEvent,
    SkipReason, clean_text,
};

use crate::discover::InputFile;
use crate::output::OutputPlanner;
use crate::{IngestError, IngestOptions, extract_text};

/// Everything a worker needs to turn an input into an output file.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub output_dir: PathBuf,
    pub extension: String,
    pub preserve_tree: bool,
    pub overwrite: bool,
    /// `None` writes extracted text untouched.
    pub clean: Option<CleanOptions>,
    pub ingest: IngestOptions,
    pub num_workers: usize,
}

impl ConvertOptions {
    pub fn from_config(config: &Config, output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            extension: config.output_extension.clone(),
            preserve_tree: config.preserve_tree,
            overwrite: config.overwrite,
            clean: config.clean.clone(),
            ingest: IngestOptions::from_config(config),
            num_workers: config.num_workers,
        }
    }
}

/// A conversion job submitted to the pool.
pub struct ConvertJob {
    pub input: InputFile,
    pub output: PathBuf,
    pub result_tx: oneshot::Sender<ConversionOutcome>,
    pub index: usize,
    pub total: usize,
    /// Progress callback for this job (emits Started, Warning, Finished).
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// A pool of worker tasks that convert documents.
///
/// Submit jobs via [`submit()`](ConversionPool::submit), receive results via
/// the oneshot receiver paired with each job.
pub struct ConversionPool {
    job_tx: async_channel::Sender<ConvertJob>,
    pool_handle: JoinHandle<()>,
}

impl ConversionPool {
    /// Create a new pool with `num_workers` worker tasks.
    pub fn new(options: Arc<ConvertOptions>, cancel: CancellationToken, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<ConvertJob>();

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    options.clone(),
                    cancel.clone(),
                )));
            }

            // Drop our clone so workers are the last holders
            drop(job_rx);

            // Workers exit when job_tx closes and the queue is drained
            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    /// Submit a job to the pool.
    pub async fn submit(&self, job: ConvertJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the pool and wait for all workers to finish.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    job_rx: async_channel::Receiver<ConvertJob>,
    options: Arc<ConvertOptions>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        let ConvertJob {
            input,
            output,
            result_tx,
            index,
            total,
            progress,
        } = job;

        // Drain remaining jobs after cancellation so every receiver resolves
        if cancel.is_cancelled() {
            tracing::debug!(input = %input.source.display(), "skipping: cancelled");
            let outcome =
                ConversionOutcome::bare(input.source, ConversionStatus::Failed("cancelled".into()));
            let _ = result_tx.send(outcome);
            continue;
        }

        progress(ProgressEvent::Started {
            index,
            total,
            path: input.source.clone(),
        });

        let source = input.source.clone();
        let opts = options.clone();
        let outcome =
            match tokio::task::spawn_blocking(move || convert_one(&input, &output, &opts)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(input = %source.display(), error = %e, "conversion task panicked");
                    ConversionOutcome::bare(
                        source.clone(),
                        ConversionStatus::Failed(format!("internal error: {}", e)),
                    )
                }
            };

        for warning in &outcome.warnings {
            progress(ProgressEvent::Warning {
                path: source.clone(),
                message: warning.clone(),
            });
        }
        progress(ProgressEvent::Finished {
            index,
            total,
            outcome: Box::new(outcome.clone()),
        });

        let _ = result_tx.send(outcome);
    }
}

/// Convert a single input to a text file at `output`.
///
/// Never fails: problems are reported through the outcome's status.
pub fn convert_one(input: &InputFile, output: &Path, options: &ConvertOptions) -> ConversionOutcome {
    let start = Instant::now();
    let mut outcome = ConversionOutcome::bare(input.source.clone(), ConversionStatus::Converted);
    outcome.output = Some(output.to_path_buf());
    outcome.format = input.format();

    if output.exists() && !options.overwrite {
        tracing::debug!(output = %output.display(), "skipping: output exists");
        outcome.status = ConversionStatus::Skipped(SkipReason::OutputExists);
        return outcome;
    }

    let extracted = match extract_text(&input.path, &options.ingest) {
        Ok(extracted) => extracted,
        Err(IngestError::UnsupportedFormat(_)) => {
            outcome.status = ConversionStatus::Skipped(SkipReason::UnsupportedFormat);
            outcome.output = None;
            outcome.elapsed = start.elapsed();
            return outcome;
        }
        Err(e) => {
            tracing::debug!(input = %input.source.display(), error = %e, "extraction failed");
            outcome.status = ConversionStatus::Failed(e.to_string());
            outcome.output = None;
            outcome.elapsed = start.elapsed();
            return outcome;
        }
    };

    outcome.format = Some(extracted.format);
    outcome.backend = Some(extracted.backend.clone());
    outcome.encoding = extracted.encoding.clone();
    outcome.pages = extracted.pages;
    outcome.warnings = extracted.warnings.clone();

    let text = match options.clean {
        Some(ref clean) => clean_text(&extracted.text, clean),
        None => extracted.text,
    };

    if text.trim().is_empty() {
        outcome.status = ConversionStatus::Skipped(SkipReason::EmptyText);
        outcome.output = None;
        outcome.elapsed = start.elapsed();
        return outcome;
    }

    if let Err(e) = write_output(output, &text) {
        outcome.status = ConversionStatus::Failed(format!("writing {}: {}", output.display(), e));
        outcome.output = None;
        outcome.elapsed = start.elapsed();
        return outcome;
    }

    outcome.chars = text.chars().count();
    outcome.words = text.split_whitespace().count();
    outcome.elapsed = start.elapsed();
    tracing::debug!(
        input = %input.source.display(),
        output = %output.display(),
        chars = outcome.chars,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "converted"
    );
    outcome
}

fn write_output(output: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, text)
}

/// Convert a batch of inputs with a fresh pool.
///
/// Output paths are planned up front, in input order, so collision renames
/// do not depend on scheduling. Outcomes come back in input order.
pub async fn convert_all(
    inputs: Vec<InputFile>,
    options: Arc<ConvertOptions>,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    cancel: CancellationToken,
) -> Vec<ConversionOutcome> {
    let total = inputs.len();
    let mut planner = OutputPlanner::new(&options.output_dir, &options.extension, options.preserve_tree);
    let pool = ConversionPool::new(options.clone(), cancel, options.num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (index, input) in inputs.into_iter().enumerate() {
        let output = planner.plan(&input);
        let (tx, rx) = oneshot::channel();
        receivers.push((input.source.clone(), rx));
        pool.submit(ConvertJob {
            input,
            output,
            result_tx: tx,
            index,
            total,
            progress: progress.clone(),
        })
        .await;
    }

    let mut outcomes = Vec::with_capacity(total);
    for (source, rx) in receivers {
        let outcome = rx.await.unwrap_or_else(|_| {
            ConversionOutcome::bare(source, ConversionStatus::Failed("cancelled".into()))
        });
        outcomes.push(outcome);
    }

    pool.shutdown().await;

    let stats = ConversionStats::from_outcomes(&outcomes);
    tracing::info!(
        total = stats.total,
        converted = stats.converted,
        skipped = stats.skipped,
        failed = stats.failed,
        "batch finished"
    );
    outcomes
}
