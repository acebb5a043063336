//! Maintenance CLI commands: `empty-trash`, `compact` and `init`.

use std::path::Path;

use crate::models::Mode;
use crate::services::ValidatorService;
use crate::storage::SqliteRepository;
use crate::{Outcome, Result};

use super::{Completion, OutputFormat, print_json};

/// Purges everything outside the live tree.
///
/// # Errors
///
/// Returns an error if the purge fails.
pub fn empty_trash(validator: &mut ValidatorService, format: OutputFormat) -> Result<Completion> {
    validator.modes_mut().set_mode(Mode::EmptyTrash, true);
    let outcome = validator.empty_trash()?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            if let Outcome::Ran(purge) = outcome {
                if purge.is_empty() {
                    println!("Trash is empty.");
                } else {
                    println!(
                        "Purged {} tree rows, {} references, {} objects",
                        purge.nodes, purge.references, purge.objects
                    );
                }
            }
        },
    }
    Ok(Completion::Success)
}

/// Renumbers the live tree.
///
/// # Errors
///
/// Returns an error if the root is not a live node or the write fails.
pub fn compact(validator: &mut ValidatorService, format: OutputFormat) -> Result<Completion> {
    validator.modes_mut().set_mode(Mode::Clean, true);
    let outcome = validator.close_gaps_in_tree()?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => println!("Tree renumbered."),
    }
    Ok(Completion::Success)
}

/// Creates (or verifies) the repository schema at `database`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub fn init(database: &Path) -> Result<Completion> {
    let repo = SqliteRepository::new(database)?;
    let counts = repo.counts()?;
    println!(
        "Initialized repository at {} ({} objects)",
        database.display(),
        counts.objects
    );
    Ok(Completion::Success)
}
