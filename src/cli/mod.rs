//! CLI command implementations.
//!
//! This module provides the command-line interface for treeguard. Each
//! submodule implements one or more related commands.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `analyze` | Run the four scans and print the report |
//! | `clean` | Delete unbound references and tree rows, close gaps |
//! | `restore` | Re-attach missing objects and orphaned subtrees |
//! | `empty-trash` | Purge subtrees outside the live tree |
//! | `compact` | Renumber the live tree |
//! | `run` | Full pass honouring the configured modes |
//! | `recovery-folder` | Print (or create) the recovery folder |
//! | `init` | Create the repository schema |
//! | `status` | Show table row counts |
//!
//! # Example Usage
//!
//! ```bash
//! # Inspect a repository
//! treeguard --database repo.db analyze
//!
//! # Save the report, review it, then clean exactly those rows
//! treeguard --database repo.db --format json analyze > report.json
//! treeguard --database repo.db clean --report report.json
//!
//! # Everything at once
//! treeguard --database repo.db run --all
//! ```

// Allow print_stdout in CLI modules (consistent with main.rs)
#![allow(clippy::print_stdout)]

mod analyze;
mod clean;
mod maintenance;
mod restore;
mod run;
mod status;

pub use analyze::execute as analyze;
pub use clean::execute as clean;
pub use maintenance::{compact, empty_trash, init};
pub use restore::execute as restore;
pub use run::execute as run;
pub use status::{recovery_folder, status};

use std::path::Path;

use serde::Serialize;

use crate::{Error, Result};

/// Output format for command results on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON document.
    Json,
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Everything succeeded.
    Success,
    /// The command ran but some entries failed.
    PartialFailure,
}

impl Completion {
    /// `PartialFailure` if `failed`, `Success` otherwise.
    #[must_use]
    pub const fn from_failures(failed: bool) -> Self {
        if failed {
            Self::PartialFailure
        } else {
            Self::Success
        }
    }
}

/// Prints `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::InvalidParameter(format!("cannot serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Reads a report previously written by `analyze --format json`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if the file cannot be read or is not
/// a JSON object.
pub fn read_report(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidParameter(format!("cannot read report {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
        Error::InvalidParameter(format!("report {} is not valid JSON: {e}", path.display()))
    })?;
    if !value.is_object() {
        return Err(Error::InvalidParameter(format!(
            "report {} must be a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Returns the list stored under `key`, or an empty list if absent.
#[must_use]
pub fn report_list(report: &serde_json::Value, key: &str) -> serde_json::Value {
    report
        .get(key)
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()))
}

fn outcome_text<T>(outcome: &crate::Outcome<T>, ran: impl FnOnce(&T) -> String) -> String {
    outcome
        .ran()
        .map_or_else(|| "skipped (mode disabled)".to_string(), ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_report() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"unbound_references": [{{"ref_id": 50, "obj_id": 999}}]}}"#).unwrap();

        let report = read_report(file.path()).unwrap();
        assert_eq!(report_list(&report, "unbound_references").as_array().unwrap().len(), 1);
        assert_eq!(report_list(&report, "unbound_childs"), serde_json::json!([]));
    }

    #[test]
    fn test_read_report_rejects_non_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(matches!(
            read_report(file.path()),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_completion() {
        assert_eq!(Completion::from_failures(false), Completion::Success);
        assert_eq!(Completion::from_failures(true), Completion::PartialFailure);
    }
}
