//! Clean CLI command.

use std::path::Path;

use serde::Serialize;

use crate::models::{Mode, UnboundChildEntry, UnboundReferenceEntry, entries_from_json};
use crate::services::ValidatorService;
use crate::{Outcome, Result};

use super::{Completion, OutputFormat, outcome_text, print_json, read_report, report_list};

#[derive(Serialize)]
struct CleanOutput {
    references_removed: Outcome<usize>,
    childs_removed: Outcome<usize>,
    gaps_closed: Outcome<()>,
}

/// Deletes unbound references and tree rows, then closes the gaps.
///
/// With `report`, only the entries listed in that file are deleted;
/// otherwise a fresh analyze pass decides.
///
/// # Errors
///
/// Returns an error if the report is malformed or a delete fails. A
/// malformed report deletes nothing.
pub fn execute(
    validator: &mut ValidatorService,
    report: Option<&Path>,
    format: OutputFormat,
) -> Result<Completion> {
    let modes = validator.modes_mut();
    modes.set_mode(Mode::Analyze, true);
    modes.set_mode(Mode::Clean, true);

    let (references_removed, childs_removed) = if let Some(path) = report {
        let report = read_report(path)?;
        let references: Vec<UnboundReferenceEntry> = entries_from_json(
            &report_list(&report, "unbound_references"),
            "unbound_references",
        )?;
        let childs: Vec<UnboundChildEntry> =
            entries_from_json(&report_list(&report, "unbound_childs"), "unbound_childs")?;
        (
            validator.remove_unbound_references(Some(&references))?,
            validator.remove_unbound_childs(Some(&childs))?,
        )
    } else {
        validator.analyze_all()?;
        (
            validator.remove_unbound_references(None)?,
            validator.remove_unbound_childs(None)?,
        )
    };
    let gaps_closed = validator.close_gaps_in_tree()?;

    let output = CleanOutput {
        references_removed,
        childs_removed,
        gaps_closed,
    };
    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            println!(
                "References removed: {}",
                outcome_text(&output.references_removed, ToString::to_string)
            );
            println!(
                "Tree rows removed: {}",
                outcome_text(&output.childs_removed, ToString::to_string)
            );
            println!(
                "Tree renumbered: {}",
                outcome_text(&output.gaps_closed, |_| "yes".to_string())
            );
        },
    }
    Ok(Completion::Success)
}
