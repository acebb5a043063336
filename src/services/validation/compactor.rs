//! Nested-set gap closing.

use std::sync::Arc;

use crate::Result;
use crate::models::RefId;
use crate::storage::RepositoryGateway;

/// Renumbers the live tree below a fixed root.
pub struct TreeCompactor {
    gateway: Arc<dyn RepositoryGateway>,
    root: RefId,
}

impl TreeCompactor {
    /// Creates a compactor for the tree rooted at `root`.
    #[must_use]
    pub fn new(gateway: Arc<dyn RepositoryGateway>, root: RefId) -> Self {
        Self { gateway, root }
    }

    /// Closes numbering gaps left by deletions.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a live node or the write fails.
    pub fn close_gaps(&self) -> Result<()> {
        self.gateway.renumber(self.root)?;
        tracing::info!(root = self.root, "Closed gaps in tree");
        metrics::counter!("validator_tree_renumber_total").increment(1);
        Ok(())
    }
}
