//! Binary entry point for treeguard.
//!
//! This binary provides the CLI interface for the treeguard repository
//! validator.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use treeguard::cli::{self, Completion, OutputFormat};
use treeguard::observability;
use treeguard::storage::SqliteRepository;
use treeguard::{ValidatorConfig, ValidatorService};

/// Exit code for invalid usage (bad arguments, config or report input).
const EXIT_USAGE: u8 = 2;

/// Treeguard - integrity validator and recovery tool for nested-set repositories.
#[derive(Parser)]
#[command(name = "treeguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "TREEGUARD_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to the repository database (overrides configuration).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Output format for results.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Scan the repository and print the report.
    Analyze,

    /// Delete unbound references and tree rows, then close tree gaps.
    Clean {
        /// Only clean the entries listed in this JSON report.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Re-attach missing objects and orphaned subtrees.
    Restore {
        /// Reference id to restore under instead of the recovery folder.
        #[arg(long)]
        recovery_folder: Option<i64>,

        /// Only restore the entries listed in this JSON report.
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Purge subtrees outside the live tree.
    EmptyTrash,

    /// Renumber the live tree.
    Compact,

    /// Run a full pass honouring the configured modes.
    Run {
        /// Mode assignment, e.g. `clean=true` (repeatable).
        #[arg(short, long = "mode", value_name = "NAME=BOOL")]
        modes: Vec<String>,

        /// Enable every mode.
        #[arg(long)]
        all: bool,
    },

    /// Print the recovery folder id, creating the folder if absent.
    RecoveryFolder,

    /// Create the repository schema.
    Init,

    /// Show repository status.
    Status,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        },
    };

    if let Err(e) = observability::init(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config) {
        Ok(Completion::Success) => ExitCode::SUCCESS,
        Ok(Completion::PartialFailure) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        },
    }
}

/// Maps an error to the process exit code.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<treeguard::Error>() {
        Some(treeguard::Error::InvalidParameter(_) | treeguard::Error::UnknownMode(_)) => {
            ExitCode::from(EXIT_USAGE)
        },
        _ => ExitCode::FAILURE,
    }
}

/// Loads configuration: file, then environment, then command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<ValidatorConfig> {
    let config = match &cli.config {
        Some(path) => ValidatorConfig::load_from_file(path)?,
        None => ValidatorConfig::load_default(),
    };
    let mut config = config.apply_env()?;

    if let Some(database) = &cli.database {
        config = config.with_database(database);
    }
    if let Commands::Run { modes, all } = &cli.command {
        if *all {
            config.modes.set(treeguard::models::ALL_MODES, true)?;
        }
        config.apply_mode_assignments(modes.iter().map(String::as_str))?;
    }
    Ok(config)
}

/// Runs the selected command.
fn run_command(cli: Cli, config: ValidatorConfig) -> anyhow::Result<Completion> {
    let format = cli.format;

    if matches!(cli.command, Commands::Init) {
        return Ok(cli::init(&config.database)?);
    }

    let repo = Arc::new(open_repository(&config.database)?);
    if matches!(cli.command, Commands::Status) {
        return Ok(cli::status(&repo, &config, format)?);
    }

    let mut validator = ValidatorService::with_repository(repo, config);
    let completion = match cli.command {
        Commands::Analyze => cli::analyze(&mut validator, format)?,
        Commands::Clean { report } => cli::clean(&mut validator, report.as_deref(), format)?,
        Commands::Restore {
            recovery_folder,
            report,
        } => cli::restore(&mut validator, recovery_folder, report.as_deref(), format)?,
        Commands::EmptyTrash => cli::empty_trash(&mut validator, format)?,
        Commands::Compact => cli::compact(&mut validator, format)?,
        Commands::Run { .. } => cli::run(&mut validator, format)?,
        Commands::RecoveryFolder => cli::recovery_folder(&mut validator, format)?,
        Commands::Init | Commands::Status => Completion::Success,
    };
    Ok(completion)
}

/// Opens an existing repository database.
fn open_repository(path: &Path) -> anyhow::Result<SqliteRepository> {
    if !path.exists() {
        anyhow::bail!(
            "repository {} does not exist (use `treeguard init` to create one)",
            path.display()
        );
    }
    SqliteRepository::new(path)
        .with_context(|| format!("failed to open repository {}", path.display()))
}
