//! Recovery folder lookup and creation.

use std::sync::Arc;

use tracing::instrument;

use crate::Result;
use crate::config::RecoveryFolderConfig;
use crate::models::{NewObject, RefId};
use crate::storage::{ObjectLifecycle, RepositoryGateway};

/// Locates or creates the container restored entries are attached under.
///
/// The resolved reference id is cached for the lifetime of the resolver, so
/// the folder object is created at most once per run. Lookup is by title,
/// which keeps resolution idempotent across runs as well.
pub struct RecoveryFolderResolver {
    gateway: Arc<dyn RepositoryGateway>,
    lifecycle: Arc<dyn ObjectLifecycle>,
    settings: RecoveryFolderConfig,
    container_type: String,
    parent_ref_id: RefId,
    cached: Option<RefId>,
}

impl RecoveryFolderResolver {
    /// Creates a resolver that creates missing folders of `container_type`
    /// under `parent_ref_id`.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        lifecycle: Arc<dyn ObjectLifecycle>,
        settings: RecoveryFolderConfig,
        container_type: impl Into<String>,
        parent_ref_id: RefId,
    ) -> Self {
        Self {
            gateway,
            lifecycle,
            settings,
            container_type: container_type.into(),
            parent_ref_id,
            cached: None,
        }
    }

    /// Returns the cached folder id, if already resolved.
    #[must_use]
    pub const fn cached(&self) -> Option<RefId> {
        self.cached
    }

    /// Returns the recovery folder's reference id, creating the folder if
    /// the repository has none in the live tree.
    ///
    /// A folder whose only tree rows are in the trash is not reused; a new
    /// one is created next to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the folder cannot be created.
    #[instrument(skip(self), fields(title = %self.settings.title))]
    pub fn resolve(&mut self) -> Result<RefId> {
        if let Some(ref_id) = self.cached {
            return Ok(ref_id);
        }

        let ref_id = match self.gateway.find_reference_by_title(&self.settings.title)? {
            Some(ref_id) => {
                tracing::debug!(ref_id, "Found recovery folder");
                ref_id
            },
            None => self.create()?,
        };

        self.cached = Some(ref_id);
        Ok(ref_id)
    }

    /// Creates the folder. No permission is granted on it, so only
    /// administrators can see restored entries.
    fn create(&self) -> Result<RefId> {
        let request = NewObject::new(&self.container_type)
            .with_title(&self.settings.title)
            .with_description(&self.settings.description);

        let obj_id = self.lifecycle.create_object(&request)?;
        let ref_id = self.lifecycle.create_reference(obj_id)?;
        self.lifecycle.attach_to_tree(ref_id, self.parent_ref_id)?;

        tracing::info!(
            obj_id,
            ref_id,
            parent = self.parent_ref_id,
            "Created recovery folder"
        );
        metrics::counter!("validator_recovery_folder_created_total").increment(1);
        Ok(ref_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteRepository;
    use crate::storage::sqlite::test_support::seeded;

    fn resolver(repo: &Arc<SqliteRepository>) -> RecoveryFolderResolver {
        RecoveryFolderResolver::new(
            repo.clone(),
            repo.clone(),
            RecoveryFolderConfig::default(),
            "cat",
            1,
        )
    }

    #[test]
    fn test_resolve_creates_once() {
        let repo = Arc::new(seeded());
        let mut resolver = resolver(&repo);
        assert_eq!(resolver.cached(), None);

        let first = resolver.resolve().unwrap();
        let second = resolver.resolve().unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.counts().unwrap().objects, 5);

        let node = repo.node_data(first).unwrap().unwrap();
        assert_eq!(node.object_type, "cat");
        assert_eq!(node.node.parent, 1);
        // admin-only: no permission rows
        assert_eq!(
            crate::storage::PermissionProvider::revoke(repo.as_ref(), first).unwrap(),
            0
        );
    }

    #[test]
    fn test_resolve_reuses_existing_folder_across_runs() {
        let repo = Arc::new(seeded());
        let created = resolver(&repo).resolve().unwrap();

        let mut next_run = resolver(&repo);
        assert_eq!(next_run.resolve().unwrap(), created);
        assert_eq!(repo.counts().unwrap().objects, 5);
    }

    #[test]
    fn test_resolve_skips_trashed_folder() {
        let repo = Arc::new(seeded());
        repo.execute_batch(
            "INSERT INTO object_data (obj_id, type, title) VALUES (90, 'cat', '__Restored Objects');
             INSERT INTO object_reference (ref_id, obj_id) VALUES (90, 90);
             INSERT INTO tree VALUES (-90, 90, 1, 20, 21, 2);",
        )
        .unwrap();

        let rfolder = resolver(&repo).resolve().unwrap();
        assert_ne!(rfolder, 90);
        assert_eq!(repo.live_node(rfolder).unwrap().map(|n| n.parent), Some(1));
        assert_eq!(repo.counts().unwrap().objects, 6);
    }

    #[test]
    fn test_resolve_fails_without_parent() {
        let repo = Arc::new(seeded());
        let mut resolver = RecoveryFolderResolver::new(
            repo.clone(),
            repo.clone(),
            RecoveryFolderConfig::default(),
            "cat",
            404,
        );
        assert!(resolver.resolve().is_err());
        assert_eq!(resolver.cached(), None);
    }
}
