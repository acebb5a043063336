//! Status CLI commands.

use serde::Serialize;

use crate::services::ValidatorService;
use crate::storage::{SqliteRepository, TableCounts};
use crate::{Result, ValidatorConfig};

use super::{Completion, OutputFormat, print_json};

#[derive(Serialize)]
struct StatusOutput<'a> {
    version: &'static str,
    database: String,
    objects: usize,
    references: usize,
    live_nodes: usize,
    trashed_nodes: usize,
    modes: Vec<(&'a str, bool)>,
}

/// Shows table row counts and the configured modes.
///
/// # Errors
///
/// Returns an error if the repository cannot be read.
pub fn status(
    repo: &SqliteRepository,
    config: &ValidatorConfig,
    format: OutputFormat,
) -> Result<Completion> {
    let TableCounts {
        objects,
        references,
        live_nodes,
        trashed_nodes,
    } = repo.counts()?;
    let modes = config.modes.snapshot();

    let output = StatusOutput {
        version: env!("CARGO_PKG_VERSION"),
        database: config.database.display().to_string(),
        objects,
        references,
        live_nodes,
        trashed_nodes,
        modes: modes.iter().map(|(m, on)| (m.as_str(), *on)).collect(),
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            println!("Treeguard Status");
            println!("================");
            println!();
            println!("Version: {}", output.version);
            println!("Database: {}", output.database);
            println!("  Objects: {}", output.objects);
            println!("  References: {}", output.references);
            println!("  Live tree nodes: {}", output.live_nodes);
            println!("  Trashed tree nodes: {}", output.trashed_nodes);
            println!();
            println!("Modes:");
            for (mode, enabled) in &output.modes {
                println!("  {mode}: {}", if *enabled { "on" } else { "off" });
            }
        },
    }
    Ok(Completion::Success)
}

/// Prints the recovery folder's reference id, creating the folder if absent.
///
/// # Errors
///
/// Returns an error if the folder cannot be found or created.
pub fn recovery_folder(validator: &mut ValidatorService, format: OutputFormat) -> Result<Completion> {
    let ref_id = validator.get_recovery_folder_id()?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "recovery_folder": ref_id }))?,
        OutputFormat::Text => println!("{ref_id}"),
    }
    Ok(Completion::Success)
}
