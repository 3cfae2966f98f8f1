//! Batch driver: walk the root's sub-folders and reprice each one in isolation.
//!
//! A folder is skipped when it lacks either input table or its join is empty.
//! Any other failure is recorded against that folder and the batch moves on.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use repricer_config::BatchConfig;
use repricer_engine::{
    check, join, run, Identifiers, Jitter, Pass, ReconciliationReport, RepriceError, RepriceSummary, Stage,
};
use repricer_io::{
    bulk_path, find_inputs, folder_name, list_folders, load_catalog, load_outlet, plot_path, write_bulk,
    write_plot, IoError,
};

use crate::exit_codes::{EXIT_FOLDERS_FAILED, EXIT_MISSING_TARGETS, EXIT_SUCCESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Full pipeline: both passes, plots and bulk export.
    Run,
    /// Before pass only: no correction and no bulk file.
    Check,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: Mode,
    pub plots: bool,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingTargets,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Processed {
    pub stage: Stage,
    pub identifiers: Identifiers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RepriceSummary>,
    pub before: ReconciliationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<ReconciliationReport>,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FolderOutcome {
    Processed(Box<Processed>),
    Skipped { reason: String },
    Failed { kind: FailureKind, message: String },
}

impl FolderOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Processed(_) => "processed",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderRecord {
    pub folder: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FolderOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub missing_targets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub mode: Mode,
    pub generated_at: String,
    pub counts: BatchCounts,
    pub folders: Vec<FolderRecord>,
}

impl BatchReport {
    /// Missing targets outrank other folder failures.
    pub fn exit_code(&self) -> u8 {
        if self.counts.missing_targets > 0 {
            EXIT_MISSING_TARGETS
        } else if self.counts.failed > 0 {
            EXIT_FOLDERS_FAILED
        } else {
            EXIT_SUCCESS
        }
    }
}

fn tally(folders: &[FolderRecord]) -> BatchCounts {
    let mut counts = BatchCounts::default();
    for record in folders {
        match &record.outcome {
            FolderOutcome::Processed(_) => counts.processed += 1,
            FolderOutcome::Skipped { .. } => counts.skipped += 1,
            FolderOutcome::Failed { kind: FailureKind::MissingTargets, .. } => counts.missing_targets += 1,
            FolderOutcome::Failed { kind: FailureKind::Error, .. } => counts.failed += 1,
        }
    }
    counts
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum FolderError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Engine(#[from] RepriceError),
}

/// Process every sub-folder of `root` in name order.
///
/// One jitter source is shared across folders, so a seeded batch is
/// reproducible end to end.
pub fn run_batch(
    root: &Path,
    config: &BatchConfig,
    options: &BatchOptions,
    jitter: &mut dyn Jitter,
) -> Result<Vec<FolderRecord>, IoError> {
    let folders = list_folders(root)?;
    info!(root = %root.display(), folders = folders.len(), "starting batch");

    let mut records = Vec::with_capacity(folders.len());
    for folder in folders {
        let outcome = process_folder(&folder, config, options, jitter);
        records.push(FolderRecord {
            folder: folder_name(&folder),
            path: folder,
            outcome,
        });
    }
    Ok(records)
}

pub fn batch_report(
    root: &Path,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    mode: Mode,
    folders: Vec<FolderRecord>,
) -> BatchReport {
    BatchReport {
        root: root.to_path_buf(),
        config: config_path,
        seed,
        mode,
        generated_at: chrono::Utc::now().to_rfc3339(),
        counts: tally(&folders),
        folders,
    }
}

pub fn process_folder(
    folder: &Path,
    config: &BatchConfig,
    options: &BatchOptions,
    jitter: &mut dyn Jitter,
) -> FolderOutcome {
    match try_process_folder(folder, config, options, jitter) {
        Ok(outcome) => outcome,
        Err(FolderError::Engine(err @ RepriceError::MissingTargetPrice { .. })) => {
            error!(folder = %folder.display(), "{err}");
            FolderOutcome::Failed {
                kind: FailureKind::MissingTargets,
                message: err.to_string(),
            }
        }
        Err(err) => {
            error!(folder = %folder.display(), "{err}");
            FolderOutcome::Failed {
                kind: FailureKind::Error,
                message: err.to_string(),
            }
        }
    }
}

fn try_process_folder(
    folder: &Path,
    config: &BatchConfig,
    options: &BatchOptions,
    jitter: &mut dyn Jitter,
) -> Result<FolderOutcome, FolderError> {
    let name = folder_name(folder);
    let inputs = find_inputs(folder, config)?;
    let (catalog_path, outlet_path) = match (&inputs.catalog, &inputs.outlet) {
        (Some(c), Some(o)) => (c, o),
        (None, _) => return Ok(skip(folder, "no catalog table")),
        (_, None) => return Ok(skip(folder, "no outlet table")),
    };

    let (ids, configured) = config.folder_ids(&name);
    if !configured {
        warn!(folder = %name, "no identifiers configured; using [defaults]");
    }

    let header_row = config.input.header_row;
    let catalog = load_catalog(catalog_path, header_row, &config.columns)?;
    let outlet = load_outlet(outlet_path, header_row, &config.columns)?;
    info!(folder = %name, catalog = catalog.len(), outlet = outlet.rows.len(), "loaded tables");

    let identifiers = Identifiers {
        qc_id: ids.qc_id,
        pg_id: ids.pg_id,
    };
    let dataset = join(&catalog, outlet, identifiers.clone());
    if dataset.is_empty() {
        return Ok(skip(folder, "join produced no rows"));
    }

    let mut outputs = Vec::new();
    let processed = match options.mode {
        Mode::Check => {
            let result = check(dataset)?;
            info!(folder = %name, flagged = result.before.total_above(), "before pass evaluated");
            if options.plots {
                outputs.push(plot(folder, &result.dataset, Pass::Before)?);
            }
            Processed {
                stage: Stage::ReportedBefore,
                identifiers,
                summary: None,
                before: result.before,
                after: None,
                outputs,
            }
        }
        Mode::Run => {
            let mut result = run(dataset, jitter)?;
            info!(
                folder = %name,
                items = result.summary.items,
                repriced = result.summary.repriced,
                residual = result.summary.residual,
                "repricing complete"
            );
            if options.plots {
                outputs.push(plot(folder, &result.dataset, Pass::Before)?);
                outputs.push(plot(folder, &result.dataset, Pass::After)?);
            }
            let bulk = bulk_path(folder, config);
            let written = write_bulk(&bulk, &result.dataset)?;
            info!(file = %bulk.display(), rows = written.rows, "wrote bulk export");
            outputs.push(bulk);
            result.mark_exported();

            Processed {
                stage: result.stage,
                identifiers,
                summary: Some(result.summary),
                before: result.before,
                after: Some(result.after),
                outputs,
            }
        }
    };
    Ok(FolderOutcome::Processed(Box::new(processed)))
}

fn plot(folder: &Path, dataset: &repricer_engine::Dataset, pass: Pass) -> Result<PathBuf, IoError> {
    let path = plot_path(folder, pass);
    let panels = write_plot(&path, dataset, pass)?;
    info!(file = %path.display(), panels, "wrote plot");
    Ok(path)
}

fn skip(folder: &Path, reason: &str) -> FolderOutcome {
    warn!(folder = %folder.display(), reason, "skipping folder");
    FolderOutcome::Skipped {
        reason: reason.to_string(),
    }
}
