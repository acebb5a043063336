//! Restore CLI command.

use std::path::Path;

use serde::Serialize;

use crate::models::{InvalidParentEntry, MissingObjectEntry, Mode, RefId, entries_from_json};
use crate::services::{RestoreReport, ValidatorService};
use crate::{Outcome, Result};

use super::{Completion, OutputFormat, outcome_text, print_json, read_report, report_list};

#[derive(Serialize)]
struct RestoreOutput {
    missing_objects: Outcome<RestoreReport>,
    unbound_childs: Outcome<RestoreReport>,
}

/// Re-attaches missing objects and orphaned subtrees.
///
/// `recovery_folder` overrides the configured folder. With `report`, only
/// the entries listed in that file are restored.
///
/// # Errors
///
/// Returns an error if the report is malformed or the recovery folder
/// cannot be resolved. A malformed report restores nothing. Failed entries are printed and reported through
/// [`Completion::PartialFailure`].
pub fn execute(
    validator: &mut ValidatorService,
    recovery_folder: Option<RefId>,
    report: Option<&Path>,
    format: OutputFormat,
) -> Result<Completion> {
    let modes = validator.modes_mut();
    modes.set_mode(Mode::Analyze, true);
    modes.set_mode(Mode::Restore, true);

    let output = if let Some(path) = report {
        let report = read_report(path)?;
        let missing: Vec<MissingObjectEntry> =
            entries_from_json(&report_list(&report, "missing_objects"), "missing_objects")?;
        let invalid: Vec<InvalidParentEntry> = entries_from_json(
            &report_list(&report, "invalid_parent_entries"),
            "invalid_parent_entries",
        )?;
        RestoreOutput {
            missing_objects: validator.restore_missing_objects(recovery_folder, Some(&missing))?,
            unbound_childs: validator.restore_unbound_childs(recovery_folder, Some(&invalid))?,
        }
    } else {
        validator.analyze_all()?;
        RestoreOutput {
            missing_objects: validator.restore_missing_objects(recovery_folder, None)?,
            unbound_childs: validator.restore_unbound_childs(recovery_folder, None)?,
        }
    };

    let failed = [&output.missing_objects, &output.unbound_childs]
        .into_iter()
        .filter_map(Outcome::ran)
        .any(RestoreReport::has_failures);

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            print_restore("Missing objects", &output.missing_objects);
            print_restore("Unbound childs", &output.unbound_childs);
        },
    }
    Ok(Completion::from_failures(failed))
}

fn print_restore(label: &str, outcome: &Outcome<RestoreReport>) {
    let text = outcome_text(outcome, |report| {
        format!(
            "{} restored, {} nodes attached, {} references created, {} excluded, {} discarded",
            report.restored,
            report.nodes_attached,
            report.references_created,
            report.excluded,
            report.discarded
        )
    });
    println!("{label}: {text}");

    if let Some(report) = outcome.ran() {
        for failure in &report.failures {
            println!("  failed {} {}: {}", failure.kind, failure.id, failure.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use crate::ValidatorConfig;
    use crate::storage::sqlite::test_support::seeded;

    #[test]
    fn test_malformed_report_restores_nothing() {
        let repo = Arc::new(seeded());
        repo.execute_batch("INSERT INTO object_data (obj_id, type, title) VALUES (20, 'fold', 'lost');")
            .unwrap();
        let before = repo.counts().unwrap();

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"missing_objects": [{{"obj_id": 20, "type": "fold", "ref_id": null, "child": null}}],
                "invalid_parent_entries": [{{"child": "x"}}]}}"#
        )
        .unwrap();

        let mut validator = ValidatorService::with_repository(repo.clone(), ValidatorConfig::default());
        let err = execute(&mut validator, None, Some(file.path()), OutputFormat::Json).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidParameter(_)));
        assert_eq!(repo.counts().unwrap(), before);
    }
}
