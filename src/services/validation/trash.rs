//! Trash purging.

use std::sync::Arc;

use crate::Result;
use crate::storage::{RepositoryGateway, TrashPurge};

/// Permanently removes subtrees marked as deleted.
pub struct TrashPurger {
    gateway: Arc<dyn RepositoryGateway>,
}

impl TrashPurger {
    /// Creates a purger.
    #[must_use]
    pub fn new(gateway: Arc<dyn RepositoryGateway>) -> Self {
        Self { gateway }
    }

    /// Deletes every tree row outside the live tree, the references only
    /// those rows used, and objects left without any reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge fails. The purge is all-or-nothing.
    pub fn purge(&self) -> Result<TrashPurge> {
        let purge = self.gateway.purge_trash()?;
        tracing::info!(
            nodes = purge.nodes,
            references = purge.references,
            objects = purge.objects,
            "Emptied trash"
        );
        metrics::counter!("validator_rows_deleted_total", "kind" => "trash_node")
            .increment(purge.nodes as u64);
        Ok(purge)
    }
}
