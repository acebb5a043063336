//! Result types returned by validation operations.

use serde::Serialize;

use crate::models::RefId;
use crate::storage::TrashPurge;

/// Result of a mode-gated operation.
///
/// `Skipped` means the operation's mode was disabled and nothing was read or
/// written. `Ran` carries the result of an operation that executed, which may
/// well be "found nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The mode gating this operation is disabled.
    Skipped,
    /// The operation executed.
    Ran(T),
}

impl<T> Outcome<T> {
    /// Returns `true` if the operation was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Returns the result if the operation ran.
    #[must_use]
    pub const fn ran(&self) -> Option<&T> {
        match self {
            Self::Skipped => None,
            Self::Ran(value) => Some(value),
        }
    }

    /// Consumes the outcome, returning the result if the operation ran.
    #[must_use]
    pub fn into_ran(self) -> Option<T> {
        match self {
            Self::Skipped => None,
            Self::Ran(value) => Some(value),
        }
    }

    /// Maps the result of an executed operation.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Skipped => Outcome::Skipped,
            Self::Ran(value) => Outcome::Ran(f(value)),
        }
    }
}

impl Outcome<usize> {
    /// Returns `true` if the operation ran and counted at least one row.
    #[must_use]
    pub const fn found_anything(&self) -> bool {
        matches!(self, Self::Ran(n) if *n > 0)
    }

    /// Count if the operation ran, `0` otherwise.
    #[must_use]
    pub const fn count(&self) -> usize {
        match self {
            Self::Skipped => 0,
            Self::Ran(n) => *n,
        }
    }
}

/// One report entry that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// What the id refers to (`object`, `reference`, `tree node`).
    pub kind: &'static str,
    /// Id of the entry that failed.
    pub id: i64,
    /// Rendered error.
    pub error: String,
}

impl EntryFailure {
    /// Creates a failure record from an error.
    #[must_use]
    pub fn new(kind: &'static str, id: i64, error: &crate::Error) -> Self {
        Self {
            kind,
            id,
            error: error.to_string(),
        }
    }
}

/// Result of a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Recovery folder the entries were attached under.
    pub recovery_folder: Option<RefId>,
    /// Entries re-attached under the recovery folder.
    pub restored: usize,
    /// Tree nodes written, including relocated descendants.
    pub nodes_attached: usize,
    /// References created for objects that had none.
    pub references_created: usize,
    /// Entries left out of the tree because their type is excluded.
    pub excluded: usize,
    /// Role folders deleted instead of restored.
    pub discarded: usize,
    /// Entries that failed; siblings were still processed.
    pub failures: Vec<EntryFailure>,
}

impl RestoreReport {
    /// Returns `true` if anything was actually restored.
    #[must_use]
    pub const fn restored_anything(&self) -> bool {
        self.restored > 0
    }

    /// Returns `true` if any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub(super) fn record_failure(&mut self, failure: EntryFailure) {
        tracing::warn!(
            kind = failure.kind,
            id = failure.id,
            error = %failure.error,
            "Restore entry failed"
        );
        metrics::counter!("validator_restore_entries_total", "result" => "failed").increment(1);
        self.failures.push(failure);
    }
}

/// Result of a full [`super::ValidatorService::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Total findings over the four scans.
    pub findings: Outcome<usize>,
    /// Unbound references deleted.
    pub references_removed: Outcome<usize>,
    /// Unbound tree rows deleted.
    pub childs_removed: Outcome<usize>,
    /// Missing objects restore.
    pub missing_objects: Outcome<RestoreReport>,
    /// Invalid-parent subtrees restore.
    pub unbound_childs: Outcome<RestoreReport>,
    /// Trash purge.
    pub trash: Outcome<TrashPurge>,
    /// Tree renumbering.
    pub gaps_closed: Outcome<()>,
    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// All entry failures of the run.
    pub fn failures(&self) -> impl Iterator<Item = &EntryFailure> {
        [&self.missing_objects, &self.unbound_childs]
            .into_iter()
            .filter_map(Outcome::ran)
            .flat_map(|report| report.failures.iter())
    }

    /// Returns `true` if any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Returns a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        match self.findings {
            Outcome::Skipped => parts.push("analyze skipped".to_string()),
            Outcome::Ran(0) => parts.push("repository is consistent".to_string()),
            Outcome::Ran(n) => parts.push(format!("{n} findings")),
        }
        if let Outcome::Ran(n) = self.references_removed {
            parts.push(format!("{n} references removed"));
        }
        if let Outcome::Ran(n) = self.childs_removed {
            parts.push(format!("{n} tree rows removed"));
        }
        if let Outcome::Ran(report) = &self.missing_objects {
            parts.push(format!("{} objects restored", report.restored));
        }
        if let Outcome::Ran(report) = &self.unbound_childs {
            parts.push(format!(
                "{} subtrees restored ({} role folders discarded)",
                report.restored, report.discarded
            ));
        }
        if let Outcome::Ran(purge) = self.trash {
            parts.push(format!("{} trashed nodes purged", purge.nodes));
        }
        if self.gaps_closed.ran().is_some() {
            parts.push("tree renumbered".to_string());
        }

        let failures = self.failures().count();
        if failures > 0 {
            parts.push(format!("{failures} entries failed"));
        }

        format!("{} in {}ms", parts.join(", "), self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            findings: Outcome::Ran(3),
            references_removed: Outcome::Ran(1),
            childs_removed: Outcome::Skipped,
            missing_objects: Outcome::Ran(RestoreReport {
                restored: 1,
                ..RestoreReport::default()
            }),
            unbound_childs: Outcome::Ran(RestoreReport {
                restored: 0,
                discarded: 1,
                failures: vec![EntryFailure {
                    kind: "tree node",
                    id: 12,
                    error: "tree node 12 not found".to_string(),
                }],
                ..RestoreReport::default()
            }),
            trash: Outcome::Skipped,
            gaps_closed: Outcome::Ran(()),
            duration_ms: 7,
        }
    }

    #[test]
    fn test_outcome_distinguishes_skipped_from_empty() {
        let skipped: Outcome<usize> = Outcome::Skipped;
        let empty = Outcome::Ran(0);
        assert!(skipped.is_skipped());
        assert!(!empty.is_skipped());
        assert!(!empty.found_anything());
        assert!(Outcome::Ran(2).found_anything());
        assert_eq!(skipped.count(), 0);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Ran(4)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ran", "result": 4}));
        let json = serde_json::to_value(Outcome::<usize>::Skipped).unwrap();
        assert_eq!(json, serde_json::json!({"status": "skipped"}));
    }

    #[test]
    fn test_run_summary() {
        let summary = summary();
        assert!(summary.has_failures());
        assert_eq!(summary.failures().count(), 1);

        let text = summary.summary();
        assert!(text.starts_with("3 findings, 1 references removed"));
        assert!(text.contains("1 objects restored"));
        assert!(text.contains("1 role folders discarded"));
        assert!(text.contains("1 entries failed"));
        assert!(!text.contains("purged"));
        assert!(text.ends_with("in 7ms"));
    }
}
