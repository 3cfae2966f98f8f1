// repricer - batch outlet repricing against a catalog price list

mod batch;
mod exit_codes;
mod logging;
mod util;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use repricer_config::{BatchConfig, ConfigError};
use repricer_engine::{Band, RandomJitter};

use batch::{batch_report, run_batch, BatchOptions, BatchReport, FolderOutcome, Mode};
use exit_codes::{EXIT_ERROR, EXIT_FOLDERS_FAILED, EXIT_MISSING_TARGETS, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "repricer")]
#[command(about = "Flag and correct outlet prices that drift from the catalog")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reprice every folder under ROOT: reports, plots and bulk export
    #[command(after_help = "\
Examples:
  repricer run
  repricer run ./exports --seed 42
  repricer run ./exports --config repricer.toml --json > batch.json
  repricer run ./exports --no-plots -v")]
    Run {
        /// Directory whose sub-folders hold the catalog and outlet tables
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Config file (default: ROOT/repricer.toml, then the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for the correction jitter (overrides `seed` in the config)
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the diagnostic plots
        #[arg(long)]
        no_plots: bool,

        /// Print the batch result as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Evaluate current prices only; no correction and no bulk file
    #[command(after_help = "\
Examples:
  repricer check ./exports
  repricer check ./exports --no-plots --json")]
    Check {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        no_plots: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print the price bands and their tolerances
    Bands {
        #[arg(long)]
        json: bool,
    },

    /// Config file commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate a config file without running
    #[command(after_help = "\
Examples:
  repricer config validate repricer.toml")]
    Validate {
        file: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  repricer-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            eprintln!("Usage: repricer <command> [options]");
            eprintln!("       repricer --help for more information");
            Ok(())
        }
        Some(Commands::Run { root, config, seed, no_plots, json }) => {
            cmd_batch(&root, config.as_deref(), seed, Mode::Run, !no_plots, json)
        }
        Some(Commands::Check { root, config, no_plots, json }) => {
            cmd_batch(&root, config.as_deref(), None, Mode::Check, !no_plots, json)
        }
        Some(Commands::Bands { json }) => cmd_bands(json),
        Some(Commands::Config(ConfigCommands::Validate { file })) => cmd_config_validate(&file),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Parse(_) => Some("see `repricer run --help` for the config location".to_string()),
            _ => None,
        };
        Self { code: EXIT_USAGE, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// run / check
// ============================================================================

fn cmd_batch(
    root: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    mode: Mode,
    plots: bool,
    json: bool,
) -> Result<(), CliError> {
    if !root.is_dir() {
        return Err(CliError::usage(format!("not a directory: {}", root.display())));
    }
    let (config, used) = BatchConfig::discover(root, config_path).map_err(CliError::config)?;
    if let Some(path) = &used {
        tracing::info!(config = %path.display(), "loaded config");
    }

    let seed = seed.or(config.seed);
    let mut jitter = match seed {
        Some(seed) => RandomJitter::seeded(seed),
        None => RandomJitter::from_entropy(),
    };
    let options = BatchOptions {
        mode,
        plots: plots && config.output.plots,
    };

    let folders = run_batch(root, &config, &options, &mut jitter)
        .map_err(|e| CliError::general(e.to_string()))?;
    let report = batch_report(root, used, seed, mode, folders);

    if json {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        print_reports(&report);
    }
    print_summary(&report);

    match report.exit_code() {
        EXIT_MISSING_TARGETS => Err(CliError {
            code: EXIT_MISSING_TARGETS,
            message: format!(
                "{} folder(s) have outlet items without a target price",
                report.counts.missing_targets
            ),
            hint: None,
        }
        .with_hint("add the listed items to the catalog table and rerun")),
        EXIT_FOLDERS_FAILED => Err(CliError {
            code: EXIT_FOLDERS_FAILED,
            message: format!("{} folder(s) failed", report.counts.failed),
            hint: Some("rerun with -v for details".to_string()),
        }),
        _ => Ok(()),
    }
}

/// Per-folder band tables, human mode only.
fn print_reports(report: &BatchReport) {
    for record in &report.folders {
        if let FolderOutcome::Processed(processed) = &record.outcome {
            eprintln!("{}", record.folder);
            eprint!("{}", processed.before);
            if let Some(after) = &processed.after {
                eprint!("{}", after);
            }
            eprintln!();
        }
    }
}

fn print_summary(report: &BatchReport) {
    let rows: Vec<Vec<String>> = report
        .folders
        .iter()
        .map(|record| {
            let (items, repriced, residual, detail) = match &record.outcome {
                FolderOutcome::Processed(p) => match &p.summary {
                    Some(s) => (s.items.to_string(), s.repriced.to_string(), s.residual.to_string(), String::new()),
                    None => (
                        p.before.total_items().to_string(),
                        p.before.total_above().to_string(),
                        "-".to_string(),
                        String::new(),
                    ),
                },
                FolderOutcome::Skipped { reason } => ("-".into(), "-".into(), "-".into(), reason.clone()),
                FolderOutcome::Failed { message, .. } => ("-".into(), "-".into(), "-".into(), message.clone()),
            };
            vec![record.folder.clone(), record.outcome.status().to_string(), items, repriced, residual, detail]
        })
        .collect();

    if !rows.is_empty() {
        let flagged = match report.mode {
            Mode::Run => "repriced",
            Mode::Check => "flagged",
        };
        eprint!(
            "{}",
            util::render_table(&["folder", "status", "items", flagged, "residual", "detail"], &rows)
        );
    }
    let c = &report.counts;
    eprintln!(
        "{} folder(s): {} processed, {} skipped, {} failed, {} missing targets",
        report.folders.len(),
        c.processed,
        c.skipped,
        c.failed,
        c.missing_targets,
    );
}

// ============================================================================
// bands
// ============================================================================

#[derive(Serialize)]
struct BandInfo {
    band: Band,
    lower: f64,
    upper: Option<f64>,
    tolerance: f64,
}

fn cmd_bands(json: bool) -> Result<(), CliError> {
    let bands: Vec<BandInfo> = Band::ALL
        .iter()
        .map(|&band| BandInfo {
            band,
            lower: band.lower(),
            upper: band.upper(),
            tolerance: band.tolerance(),
        })
        .collect();

    if json {
        let json_str = serde_json::to_string_pretty(&bands)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = bands
        .iter()
        .map(|b| {
            vec![
                b.band.label().to_string(),
                b.lower.to_string(),
                b.upper.map(|u| u.to_string()).unwrap_or_else(|| "-".to_string()),
                format!("{}%", (b.tolerance * 100.0).round()),
            ]
        })
        .collect();
    print!("{}", util::render_table(&["band", "from", "to", "tolerance"], &rows));
    Ok(())
}

// ============================================================================
// config validate
// ============================================================================

fn cmd_config_validate(file: &Path) -> Result<(), CliError> {
    let config = BatchConfig::from_path(file).map_err(CliError::config)?;
    eprintln!(
        "{}: ok (header row {}, {} folder entr{})",
        file.display(),
        config.input.header_row,
        config.folders.len(),
        if config.folders.len() == 1 { "y" } else { "ies" },
    );
    Ok(())
}
