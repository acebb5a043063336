//! Deletes unbound rows.

use std::collections::HashSet;
use std::sync::Arc;

use crate::Result;
use crate::models::{UnboundChildEntry, UnboundReferenceEntry};
use crate::storage::RepositoryGateway;

/// Deletes references and tree rows listed as unbound.
///
/// Both operations are idempotent: deleting a row that is already gone
/// counts as zero.
pub struct Cleaner {
    gateway: Arc<dyn RepositoryGateway>,
}

impl Cleaner {
    /// Creates a cleaner.
    #[must_use]
    pub fn new(gateway: Arc<dyn RepositoryGateway>) -> Self {
        Self { gateway }
    }

    /// Deletes each reference by its exact `(ref_id, obj_id)` pair.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns the first repository error; earlier deletions stay applied.
    pub fn remove_references(&self, entries: &[UnboundReferenceEntry]) -> Result<usize> {
        let mut removed = 0;
        for entry in entries {
            if self.gateway.delete_reference(entry.ref_id, entry.obj_id)? {
                tracing::debug!(ref_id = entry.ref_id, obj_id = entry.obj_id, "Removed unbound reference");
                removed += 1;
            }
        }
        record_deleted("reference", removed);
        Ok(removed)
    }

    /// Deletes every tree row of each listed child.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns the first repository error; earlier deletions stay applied.
    pub fn remove_childs(&self, entries: &[UnboundChildEntry]) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut removed = 0;
        for entry in entries {
            if !seen.insert(entry.child) {
                continue;
            }
            let rows = self.gateway.delete_tree_node(entry.child)?;
            tracing::debug!(child = entry.child, rows, "Removed unbound tree rows");
            removed += rows;
        }
        record_deleted("tree_node", removed);
        Ok(removed)
    }
}

fn record_deleted(kind: &'static str, count: usize) {
    tracing::info!(kind, count, "Deleted unbound rows");
    metrics::counter!("validator_rows_deleted_total", "kind" => kind).increment(count as u64);
}
