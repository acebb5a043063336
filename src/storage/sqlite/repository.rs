//! `SQLite` implementation of the repository gateway.

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::connection::{acquire_lock, configure_connection};
use super::metrics::record_operation_metrics;
use super::nested_set::{self, NODE_COLUMNS, node_from_row};
use super::schema::initialize_schema;
use crate::models::{
    InvalidParentEntry, LIVE_TREE, MissingObjectEntry, NodeData, ObjectId, ObjectRecord,
    ROOT_PARENT, RefId, ReferenceRecord, TreeNode, UnboundChildEntry, UnboundReferenceEntry,
};
use crate::storage::traits::{RepositoryGateway, TrashPurge};
use crate::{Error, Result};

/// Row counts of the repository tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    /// Rows in `object_data`.
    pub objects: usize,
    /// Rows in `object_reference`.
    pub references: usize,
    /// Rows in `tree` with `tree = 1`.
    pub live_nodes: usize,
    /// Rows in `tree` with any other discriminator.
    pub trashed_nodes: usize,
}

/// SQLite-backed repository.
///
/// Implements [`RepositoryGateway`], [`crate::storage::ObjectLifecycle`] and
/// [`crate::storage::PermissionProvider`] over a single connection.
pub struct SqliteRepository {
    /// Database connection (mutex for interior mutability).
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Opens (or creates) a repository database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::repository("open_repository", e))?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory repository (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::repository("open_repository_memory", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure_connection(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` on the locked connection and records its metrics.
    pub(super) fn with_conn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = f(&conn);
        drop(conn);
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", operation, start, status);
        result
    }

    /// Executes raw SQL statements, e.g. to seed or import a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn("execute_batch", |conn| {
            conn.execute_batch(sql)
                .map_err(|e| Error::repository("execute_batch", e))
        })
    }

    /// Returns the row counts of the repository tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn counts(&self) -> Result<TableCounts> {
        self.with_conn("counts", |conn| {
            conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM object_data),
                    (SELECT COUNT(*) FROM object_reference),
                    (SELECT COUNT(*) FROM tree WHERE tree = ?1),
                    (SELECT COUNT(*) FROM tree WHERE tree != ?1)",
                params![LIVE_TREE],
                |row| {
                    Ok(TableCounts {
                        objects: count(row.get(0)?),
                        references: count(row.get(1)?),
                        live_nodes: count(row.get(2)?),
                        trashed_nodes: count(row.get(3)?),
                    })
                },
            )
            .map_err(|e| Error::repository("counts", e))
        })
    }

    /// Returns the object row `obj_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn object(&self, obj_id: ObjectId) -> Result<Option<ObjectRecord>> {
        self.with_conn("object", |conn| {
            conn.query_row(
                "SELECT obj_id, type, title, description FROM object_data WHERE obj_id = ?1",
                params![obj_id],
                |row| {
                    Ok(ObjectRecord {
                        obj_id: row.get(0)?,
                        object_type: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::repository("object", e))
        })
    }

    /// Returns all references of `obj_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn references_of(&self, obj_id: ObjectId) -> Result<Vec<ReferenceRecord>> {
        self.with_conn("references_of", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT ref_id, obj_id FROM object_reference WHERE obj_id = ?1 ORDER BY ref_id",
                )
                .map_err(|e| Error::repository("prepare_references_of", e))?;
            stmt.query_map(params![obj_id], |row| {
                Ok(ReferenceRecord {
                    ref_id: row.get(0)?,
                    obj_id: row.get(1)?,
                })
            })
            .and_then(Iterator::collect)
            .map_err(|e| Error::repository("references_of", e))
        })
    }

    /// Returns every tree row of `child`, live row first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn tree_nodes_of(&self, child: RefId) -> Result<Vec<TreeNode>> {
        self.with_conn("tree_nodes_of", |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM tree WHERE child = ?1
                     ORDER BY (tree = ?2) DESC, tree"
                ))
                .map_err(|e| Error::repository("prepare_tree_nodes_of", e))?;
            stmt.query_map(params![child, LIVE_TREE], node_from_row)
                .and_then(Iterator::collect)
                .map_err(|e| Error::repository("tree_nodes_of", e))
        })
    }

    /// Returns the live children of `parent`, ordered by `lft`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn live_children(&self, parent: RefId) -> Result<Vec<TreeNode>> {
        self.with_conn("live_children", |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {NODE_COLUMNS} FROM tree WHERE parent = ?1 AND tree = ?2 ORDER BY lft"
                ))
                .map_err(|e| Error::repository("prepare_live_children", e))?;
            stmt.query_map(params![parent, LIVE_TREE], node_from_row)
                .and_then(Iterator::collect)
                .map_err(|e| Error::repository("live_children", e))
        })
    }
}

/// Converts a `COUNT(*)` value.
fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Builds `?N, ?N+1, ...` placeholders starting at `first`.
fn placeholders(first: usize, len: usize) -> String {
    (first..first + len)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl RepositoryGateway for SqliteRepository {
    fn find_missing_objects(&self, rbac_types: &[String]) -> Result<Vec<MissingObjectEntry>> {
        self.with_conn("find_missing_objects", |conn| {
            let sql = format!(
                "SELECT o.obj_id, o.type, r.ref_id FROM object_data o
                 LEFT JOIN object_reference r ON o.obj_id = r.obj_id
                 LEFT JOIN tree t ON r.ref_id = t.child
                 WHERE (r.obj_id IS NULL OR t.child IS NULL)
                 AND o.type IN ({})
                 ORDER BY o.obj_id, r.ref_id",
                placeholders(1, rbac_types.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::repository("prepare_find_missing_objects", e))?;
            stmt.query_map(params_from_iter(rbac_types.iter()), |row| {
                Ok(MissingObjectEntry {
                    obj_id: row.get(0)?,
                    object_type: row.get(1)?,
                    ref_id: row.get(2)?,
                    child: None,
                })
            })
            .and_then(Iterator::collect)
            .map_err(|e| Error::repository("find_missing_objects", e))
        })
    }

    fn find_unbound_references(
        &self,
        rbac_types: &[String],
    ) -> Result<Vec<UnboundReferenceEntry>> {
        self.with_conn("find_unbound_references", |conn| {
            let sql = format!(
                "SELECT r.ref_id, r.obj_id FROM object_reference r
                 LEFT JOIN object_data o ON o.obj_id = r.obj_id
                 WHERE o.obj_id IS NULL OR o.type NOT IN ({})
                 ORDER BY r.ref_id",
                placeholders(1, rbac_types.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::repository("prepare_find_unbound_references", e))?;
            stmt.query_map(params_from_iter(rbac_types.iter()), |row| {
                Ok(UnboundReferenceEntry {
                    ref_id: row.get(0)?,
                    obj_id: row.get(1)?,
                })
            })
            .and_then(Iterator::collect)
            .map_err(|e| Error::repository("find_unbound_references", e))
        })
    }

    fn find_unbound_childs(&self) -> Result<Vec<UnboundChildEntry>> {
        self.with_conn("find_unbound_childs", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT t.child, t.parent, t.tree FROM tree t
                     LEFT JOIN object_reference r ON t.child = r.ref_id
                     WHERE r.ref_id IS NULL
                     ORDER BY t.child, t.tree",
                )
                .map_err(|e| Error::repository("prepare_find_unbound_childs", e))?;
            stmt.query_map([], |row| {
                Ok(UnboundChildEntry {
                    child: row.get(0)?,
                    parent: row.get(1)?,
                    tree: row.get(2)?,
                })
            })
            .and_then(Iterator::collect)
            .map_err(|e| Error::repository("find_unbound_childs", e))
        })
    }

    fn find_childs_with_invalid_parent(&self) -> Result<Vec<InvalidParentEntry>> {
        self.with_conn("find_childs_with_invalid_parent", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT t.child, t.parent,
                        (SELECT p.parent FROM tree p WHERE p.child = t.parent
                         ORDER BY p.tree LIMIT 1),
                        (SELECT p.tree FROM tree p WHERE p.child = t.parent
                         ORDER BY p.tree LIMIT 1)
                     FROM tree t
                     WHERE t.tree = ?1 AND t.parent != ?2
                     AND NOT EXISTS (
                         SELECT 1 FROM tree l WHERE l.child = t.parent AND l.tree = ?1
                     )
                     ORDER BY t.lft, t.child",
                )
                .map_err(|e| Error::repository("prepare_find_childs_with_invalid_parent", e))?;
            stmt.query_map(params![LIVE_TREE, ROOT_PARENT], |row| {
                Ok(InvalidParentEntry {
                    child: row.get(0)?,
                    parent: row.get(1)?,
                    grandparent: row.get(2)?,
                    parent_tree: row.get(3)?,
                })
            })
            .and_then(Iterator::collect)
            .map_err(|e| Error::repository("find_childs_with_invalid_parent", e))
        })
    }

    fn find_reference_by_title(&self, title: &str) -> Result<Option<RefId>> {
        self.with_conn("find_reference_by_title", |conn| {
            conn.query_row(
                "SELECT r.ref_id FROM object_reference r
                 JOIN object_data o ON o.obj_id = r.obj_id
                 WHERE o.title = ?1
                 AND EXISTS (
                     SELECT 1 FROM tree t WHERE t.child = r.ref_id AND t.tree = ?2
                 )
                 ORDER BY r.ref_id
                 LIMIT 1",
                params![title, LIVE_TREE],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::repository("find_reference_by_title", e))
        })
    }

    fn live_node(&self, child: RefId) -> Result<Option<TreeNode>> {
        self.with_conn("live_node", |conn| nested_set::live_node(conn, child))
    }

    fn node_data(&self, child: RefId) -> Result<Option<NodeData>> {
        self.with_conn("node_data", |conn| {
            conn.query_row(
                "SELECT t.tree, t.child, t.parent, t.lft, t.rgt, t.depth,
                        o.obj_id, o.type, o.title
                 FROM tree t
                 JOIN object_reference r ON r.ref_id = t.child
                 JOIN object_data o ON o.obj_id = r.obj_id
                 WHERE t.child = ?1
                 ORDER BY (t.tree = ?2) DESC, t.tree
                 LIMIT 1",
                params![child, LIVE_TREE],
                |row| {
                    Ok(NodeData {
                        node: node_from_row(row)?,
                        obj_id: row.get(6)?,
                        object_type: row.get(7)?,
                        title: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::repository("node_data", e))
        })
    }

    fn subtree(&self, node: &TreeNode) -> Result<Vec<TreeNode>> {
        self.with_conn("subtree", |conn| nested_set::collect_subtree(conn, node))
    }

    fn delete_reference(&self, ref_id: RefId, obj_id: ObjectId) -> Result<bool> {
        self.with_conn("delete_reference", |conn| {
            conn.execute(
                "DELETE FROM object_reference WHERE ref_id = ?1 AND obj_id = ?2",
                params![ref_id, obj_id],
            )
            .map(|n| n > 0)
            .map_err(|e| Error::repository("delete_reference", e))
        })
    }

    fn delete_tree_node(&self, child: RefId) -> Result<usize> {
        self.with_conn("delete_tree_node", |conn| {
            conn.execute("DELETE FROM tree WHERE child = ?1", params![child])
                .map_err(|e| Error::repository("delete_tree_node", e))
        })
    }

    fn delete_subtree(&self, node: &TreeNode) -> Result<usize> {
        self.with_conn("delete_subtree", |conn| {
            let members = nested_set::collect_subtree(conn, node)?;
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| Error::repository("delete_subtree", e))?;
            let mut deleted = 0;
            for member in &members {
                deleted += tx
                    .execute(
                        "DELETE FROM tree WHERE child = ?1 AND tree = ?2",
                        params![member.child, member.tree],
                    )
                    .map_err(|e| Error::repository("delete_subtree", e))?;
            }
            tx.commit()
                .map_err(|e| Error::repository("delete_subtree", e))?;
            Ok(deleted)
        })
    }

    fn insert_reference(&self, obj_id: ObjectId) -> Result<RefId> {
        self.with_conn("insert_reference", |conn| insert_reference(conn, obj_id))
    }

    fn insert_node(&self, child: RefId, parent: RefId) -> Result<TreeNode> {
        self.with_conn("insert_node", |conn| {
            nested_set::insert_last_child(conn, child, parent)
        })
    }

    fn renumber(&self, root: RefId) -> Result<()> {
        self.with_conn("renumber", |conn| {
            let written = nested_set::renumber(conn, root)?;
            tracing::debug!(root, written, "Renumbered live tree");
            Ok(())
        })
    }

    fn purge_trash(&self) -> Result<TrashPurge> {
        self.with_conn("purge_trash", purge_trash)
    }
}

/// Inserts a reference row and returns the generated id.
pub(super) fn insert_reference(conn: &Connection, obj_id: ObjectId) -> Result<RefId> {
    conn.execute(
        "INSERT INTO object_reference (obj_id) VALUES (?1)",
        params![obj_id],
    )
    .map_err(|e| Error::repository("insert_reference", e))?;
    Ok(conn.last_insert_rowid())
}

/// Removes trashed tree rows and whatever they alone kept alive.
fn purge_trash(conn: &Connection) -> Result<TrashPurge> {
    let map_err = |e: rusqlite::Error| Error::repository("purge_trash", e);
    let tx = conn.unchecked_transaction().map_err(map_err)?;

    let trashed: Vec<RefId> = {
        let mut stmt = tx
            .prepare("SELECT DISTINCT child FROM tree WHERE tree != ?1")
            .map_err(map_err)?;
        stmt.query_map(params![LIVE_TREE], |row| row.get(0))
            .and_then(Iterator::collect)
            .map_err(map_err)?
    };

    let mut purge = TrashPurge {
        nodes: tx
            .execute("DELETE FROM tree WHERE tree != ?1", params![LIVE_TREE])
            .map_err(map_err)?,
        ..TrashPurge::default()
    };

    for ref_id in trashed {
        let obj_id: Option<ObjectId> = tx
            .query_row(
                "SELECT obj_id FROM object_reference r WHERE ref_id = ?1
                 AND NOT EXISTS (SELECT 1 FROM tree t WHERE t.child = r.ref_id)",
                params![ref_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_err)?;
        let Some(obj_id) = obj_id else {
            continue;
        };

        purge.references += tx
            .execute(
                "DELETE FROM object_reference WHERE ref_id = ?1",
                params![ref_id],
            )
            .map_err(map_err)?;
        tx.execute("DELETE FROM rbac_pa WHERE ref_id = ?1", params![ref_id])
            .map_err(map_err)?;
        purge.objects += tx
            .execute(
                "DELETE FROM object_data WHERE obj_id = ?1
                 AND NOT EXISTS (SELECT 1 FROM object_reference WHERE obj_id = ?1)",
                params![obj_id],
            )
            .map_err(map_err)?;
    }

    tx.commit().map_err(map_err)?;
    Ok(purge)
}
