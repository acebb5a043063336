//! Analyze CLI command.

use crate::models::{Mode, ValidationReport};
use crate::services::ValidatorService;
use crate::{Outcome, Result};

use super::{Completion, OutputFormat, print_json};

/// Runs the four scans and prints the report.
///
/// # Errors
///
/// Returns an error if a scan fails.
pub fn execute(validator: &mut ValidatorService, format: OutputFormat) -> Result<Completion> {
    validator.modes_mut().set_mode(Mode::Analyze, true);
    let outcome = validator.analyze_all()?;

    match format {
        OutputFormat::Json => print_json(validator.report())?,
        OutputFormat::Text => {
            if let Outcome::Ran(total) = outcome {
                print_report(validator.report(), total);
            }
        },
    }
    Ok(Completion::Success)
}

fn print_report(report: &ValidationReport, total: usize) {
    if total == 0 {
        println!("Repository is consistent.");
        return;
    }

    println!("Found {total} problems");
    println!();

    println!("Missing objects: {}", report.missing_objects.len());
    for entry in &report.missing_objects {
        let fix = if entry.needs_reference() {
            "needs reference"
        } else {
            "needs tree node"
        };
        println!(
            "  obj {} ({}) ref {}: {fix}",
            entry.obj_id,
            entry.object_type,
            entry.ref_id.map_or_else(|| "-".to_string(), |r| r.to_string())
        );
    }

    println!("Unbound references: {}", report.unbound_references.len());
    for entry in &report.unbound_references {
        println!("  ref {} -> obj {}", entry.ref_id, entry.obj_id);
    }

    println!("Unbound tree childs: {}", report.unbound_childs.len());
    for entry in &report.unbound_childs {
        println!(
            "  child {} under {} (tree {})",
            entry.child, entry.parent, entry.tree
        );
    }

    println!(
        "Childs with invalid parent: {}",
        report.invalid_parent_entries.len()
    );
    for entry in &report.invalid_parent_entries {
        println!(
            "  child {} under {}: parent {}",
            entry.child,
            entry.parent,
            entry.parent_state().as_str()
        );
    }
}
