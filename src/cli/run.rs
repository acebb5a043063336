//! Run CLI command.

use crate::services::ValidatorService;
use crate::Result;

use super::{Completion, OutputFormat, print_json};

/// Runs a full pass with the validator's current modes.
///
/// # Errors
///
/// Returns the first error that aborts a step.
pub fn execute(validator: &mut ValidatorService, format: OutputFormat) -> Result<Completion> {
    let summary = validator.run()?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!("{}", summary.summary());
            for failure in summary.failures() {
                println!("  failed {} {}: {}", failure.kind, failure.id, failure.error);
            }
        },
    }
    Ok(Completion::from_failures(summary.has_failures()))
}
