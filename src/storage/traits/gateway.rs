//! Repository gateway trait.
//!
//! The only component issuing queries against the object, reference and
//! tree tables.

use serde::Serialize;

use crate::Result;
use crate::models::{
    InvalidParentEntry, MissingObjectEntry, NodeData, ObjectId, RefId, TreeNode,
    UnboundChildEntry, UnboundReferenceEntry,
};

/// Counts of rows removed by [`RepositoryGateway::purge_trash`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrashPurge {
    /// Tree rows outside the live tree.
    pub nodes: usize,
    /// References that pointed at those rows and nowhere else.
    pub references: usize,
    /// Objects left without any reference.
    pub objects: usize,
}

impl TrashPurge {
    /// Returns `true` if nothing was removed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes == 0 && self.references == 0 && self.objects == 0
    }
}

/// Data access for the three repository tables.
///
/// Read methods never mutate. Write methods apply to exactly the rows named
/// by their arguments. Implementations must be thread-safe (`Send + Sync`).
pub trait RepositoryGateway: Send + Sync {
    // =========================================================================
    // Scans
    // =========================================================================

    /// Objects of a type in `rbac_types` lacking a reference or a tree node.
    ///
    /// An object with several references yields one entry per reference that
    /// has no tree node.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn find_missing_objects(&self, rbac_types: &[String]) -> Result<Vec<MissingObjectEntry>>;

    /// References whose object is absent or not of a type in `rbac_types`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn find_unbound_references(&self, rbac_types: &[String])
    -> Result<Vec<UnboundReferenceEntry>>;

    /// Tree nodes whose child does not resolve to a reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn find_unbound_childs(&self) -> Result<Vec<UnboundChildEntry>>;

    /// Live tree nodes (other than the root) whose parent is not a live node.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn find_childs_with_invalid_parent(&self) -> Result<Vec<InvalidParentEntry>>;

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Reference id of the first object carrying `title` that has a live
    /// tree node, if any. References only present in the trash are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn find_reference_by_title(&self, title: &str) -> Result<Option<RefId>>;

    /// The live tree node of `child`, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn live_node(&self, child: RefId) -> Result<Option<TreeNode>>;

    /// Tree node of `child` joined with its object.
    ///
    /// Prefers the live node when a reference sits in several trees.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn node_data(&self, child: RefId) -> Result<Option<NodeData>>;

    /// `node` and all its descendants in the same tree, parents before their
    /// children and siblings by `lft`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn subtree(&self, node: &TreeNode) -> Result<Vec<TreeNode>>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Deletes the reference row matching both ids exactly.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_reference(&self, ref_id: RefId, obj_id: ObjectId) -> Result<bool>;

    /// Deletes every tree row whose child is `child`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_tree_node(&self, child: RefId) -> Result<usize>;

    /// Deletes `node` and every descendant reachable through parent links.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_subtree(&self, node: &TreeNode) -> Result<usize>;

    /// Inserts a new reference for `obj_id` and returns its generated id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_reference(&self, obj_id: ObjectId) -> Result<RefId>;

    /// Inserts `child` as the last child of the live node `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `parent` is not a live node, or
    /// an error if the write fails.
    fn insert_node(&self, child: RefId, parent: RefId) -> Result<TreeNode>;

    /// Recomputes `lft`/`rgt`/`depth` of the live subtree under `root` so the
    /// numbering has no gaps.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a live node or the write fails.
    fn renumber(&self, root: RefId) -> Result<()>;

    /// Deletes trashed tree rows, references only they used and objects left
    /// without references.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge fails; nothing is deleted in that case.
    fn purge_trash(&self) -> Result<TrashPurge>;
}
