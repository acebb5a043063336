//! Re-attaches recoverable objects and subtrees under the recovery folder.
//!
//! Entries are independent: a failure on one entry is recorded in the
//! [`RestoreReport`] and the remaining entries are still processed.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ObjectTypesConfig;
use crate::models::{InvalidParentEntry, MissingObjectEntry, RefId, TreeNode};
use crate::storage::{ObjectLifecycle, PermissionProvider, RepositoryGateway};
use crate::{Error, Result};

use super::types::{EntryFailure, RestoreReport};

/// What happened to an invalid-parent entry during capture.
enum Capture {
    /// Role folder, deleted outright.
    Discarded,
    /// Subtree removed from the tree, top node first.
    Subtree(Vec<TreeNode>),
}

/// A subtree whose re-attachment stopped at `node`.
struct PartialAttach {
    node: RefId,
    attached: usize,
    error: Error,
}

/// Restores missing objects and relocates orphaned subtrees.
pub struct Restorer {
    gateway: Arc<dyn RepositoryGateway>,
    lifecycle: Arc<dyn ObjectLifecycle>,
    permissions: Arc<dyn PermissionProvider>,
    object_types: ObjectTypesConfig,
}

impl Restorer {
    /// Creates a restorer.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        lifecycle: Arc<dyn ObjectLifecycle>,
        permissions: Arc<dyn PermissionProvider>,
        object_types: ObjectTypesConfig,
    ) -> Self {
        Self {
            gateway,
            lifecycle,
            permissions,
            object_types,
        }
    }

    /// Gives each missing object a reference if it has none and attaches it
    /// under `rfolder`, unless its type is excluded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `rfolder` is not a live tree node.
    /// Nothing is written in that case.
    pub fn restore_missing_objects(
        &self,
        entries: &[MissingObjectEntry],
        rfolder: RefId,
    ) -> Result<RestoreReport> {
        self.require_live(rfolder)?;

        let mut report = RestoreReport {
            recovery_folder: Some(rfolder),
            ..RestoreReport::default()
        };

        for entry in entries {
            if let Err(e) = self.restore_missing_object(entry, rfolder, &mut report) {
                report.record_failure(EntryFailure::new("object", entry.obj_id, &e));
            }
        }

        tracing::info!(
            restored = report.restored,
            references_created = report.references_created,
            excluded = report.excluded,
            failed = report.failures.len(),
            "Restored missing objects"
        );
        metrics::counter!("validator_restore_entries_total", "result" => "restored")
            .increment(report.restored as u64);
        Ok(report)
    }

    fn restore_missing_object(
        &self,
        entry: &MissingObjectEntry,
        rfolder: RefId,
        report: &mut RestoreReport,
    ) -> Result<()> {
        let ref_id = match entry.ref_id {
            Some(ref_id) => ref_id,
            None => {
                let ref_id = self.lifecycle.create_reference(entry.obj_id)?;
                report.references_created += 1;
                tracing::debug!(obj_id = entry.obj_id, ref_id, "Created reference");
                ref_id
            },
        };

        if self.object_types.is_excluded(&entry.object_type) {
            tracing::debug!(
                obj_id = entry.obj_id,
                object_type = %entry.object_type,
                "Excluded type, not attached"
            );
            report.excluded += 1;
            return Ok(());
        }

        self.gateway.insert_node(ref_id, rfolder)?;
        report.restored += 1;
        report.nodes_attached += 1;
        Ok(())
    }

    /// Relocates the subtree of each invalid-parent entry under `rfolder`.
    ///
    /// Every subtree is captured and removed from the tree before any is
    /// re-inserted. The top node lands under `rfolder`; descendants are
    /// re-attached under their original parents, top-down, so the subtree
    /// keeps its shape. Role folders are deleted instead.
    ///
    /// Permissions are revoked on every moved node and re-derived from its
    /// new parent. Fine-grained grants that existed before the move are not
    /// preserved.
    ///
    /// An entry whose subtree contains `rfolder` is left in place and
    /// recorded as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `rfolder` is not a live tree node.
    /// The tree is left untouched in that case.
    pub fn restore_unbound_childs(
        &self,
        entries: &[InvalidParentEntry],
        rfolder: RefId,
    ) -> Result<RestoreReport> {
        self.require_live(rfolder)?;

        let mut report = RestoreReport {
            recovery_folder: Some(rfolder),
            ..RestoreReport::default()
        };

        let mut captured = Vec::new();
        let mut seen = HashSet::new();
        for entry in entries {
            if seen.contains(&entry.child) {
                tracing::debug!(child = entry.child, "Already captured with another subtree");
                continue;
            }
            match self.capture(entry, rfolder) {
                Ok(Capture::Discarded) => {
                    report.discarded += 1;
                    metrics::counter!("validator_restore_entries_total", "result" => "discarded")
                        .increment(1);
                },
                Ok(Capture::Subtree(nodes)) => {
                    seen.extend(nodes.iter().map(|n| n.child));
                    captured.push(nodes);
                },
                Err(e) => report.record_failure(EntryFailure::new("tree node", entry.child, &e)),
            }
        }

        for nodes in &captured {
            match self.reattach(nodes, rfolder) {
                Ok(attached) => {
                    report.restored += 1;
                    report.nodes_attached += attached;
                },
                Err(partial) => {
                    report.nodes_attached += partial.attached;
                    tracing::warn!(
                        node = partial.node,
                        attached = partial.attached,
                        lost = nodes.len() - partial.attached,
                        "Subtree only partly restored"
                    );
                    report.record_failure(EntryFailure::new(
                        "tree node",
                        partial.node,
                        &partial.error,
                    ));
                },
            }
        }

        tracing::info!(
            restored = report.restored,
            nodes = report.nodes_attached,
            discarded = report.discarded,
            failed = report.failures.len(),
            "Restored unbound childs"
        );
        metrics::counter!("validator_restore_entries_total", "result" => "restored")
            .increment(report.restored as u64);
        Ok(report)
    }

    fn require_live(&self, rfolder: RefId) -> Result<()> {
        match self.gateway.live_node(rfolder)? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                kind: "live tree node",
                id: rfolder,
            }),
        }
    }

    fn capture(&self, entry: &InvalidParentEntry, rfolder: RefId) -> Result<Capture> {
        let data = self.gateway.node_data(entry.child)?.ok_or(Error::NotFound {
            kind: "tree node",
            id: entry.child,
        })?;

        if self.object_types.is_role_folder(&data.object_type) {
            self.lifecycle.delete_object(entry.child)?;
            tracing::info!(
                ref_id = entry.child,
                obj_id = data.obj_id,
                "Deleted orphaned role folder"
            );
            return Ok(Capture::Discarded);
        }

        let nodes = self.gateway.subtree(&data.node)?;
        if nodes.iter().any(|n| n.child == rfolder) {
            return Err(Error::InvalidParameter(format!(
                "subtree of {} contains the recovery folder {rfolder}",
                entry.child
            )));
        }
        let deleted = self.gateway.delete_subtree(&data.node)?;
        tracing::debug!(top = entry.child, nodes = nodes.len(), deleted, "Captured subtree");
        Ok(Capture::Subtree(nodes))
    }

    /// Re-inserts a captured subtree, top node under `rfolder`. Stops at
    /// the first node that cannot be attached.
    fn reattach(
        &self,
        nodes: &[TreeNode],
        rfolder: RefId,
    ) -> std::result::Result<usize, PartialAttach> {
        for (attached, node) in nodes.iter().enumerate() {
            let parent = if attached == 0 { rfolder } else { node.parent };
            self.move_node(node.child, parent)
                .map_err(|error| PartialAttach {
                    node: node.child,
                    attached,
                    error,
                })?;
        }
        Ok(nodes.len())
    }

    fn move_node(&self, child: RefId, parent: RefId) -> Result<()> {
        self.permissions.revoke(child)?;
        self.gateway.insert_node(child, parent)?;
        self.permissions.apply_baseline(child, parent)?;
        Ok(())
    }
}
