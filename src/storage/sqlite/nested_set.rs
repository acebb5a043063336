//! Nested-set maintenance over the `tree` table.
//!
//! Subtree membership is resolved through parent links rather than the
//! `lft`/`rgt` interval, since the intervals are exactly what a corrupted
//! repository cannot be trusted on. The intervals still decide sibling order.

use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{LIVE_TREE, RefId, TreeNode};
use crate::{Error, Result};

/// Column list matching [`node_from_row`].
pub const NODE_COLUMNS: &str = "tree, child, parent, lft, rgt, depth";

/// Maps a row selected with [`NODE_COLUMNS`] to a [`TreeNode`].
pub fn node_from_row(row: &Row<'_>) -> rusqlite::Result<TreeNode> {
    Ok(TreeNode {
        tree: row.get(0)?,
        child: row.get(1)?,
        parent: row.get(2)?,
        lft: row.get(3)?,
        rgt: row.get(4)?,
        depth: row.get(5)?,
    })
}

/// Returns the live tree node of `child`, if any.
pub fn live_node(conn: &Connection, child: RefId) -> Result<Option<TreeNode>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM tree WHERE child = ?1 AND tree = ?2 LIMIT 1"),
        params![child, LIVE_TREE],
        node_from_row,
    )
    .optional()
    .map_err(|e| Error::repository("live_node", e))
}

/// Inserts `child` as the last child of the live node `parent`.
///
/// Every live key at or right of the parent's `rgt` shifts by two to make
/// room for the new leaf.
pub fn insert_last_child(conn: &Connection, child: RefId, parent: RefId) -> Result<TreeNode> {
    if live_node(conn, child)?.is_some() {
        return Err(Error::InvalidParameter(format!(
            "reference {child} is already part of the live tree"
        )));
    }
    let parent_node = live_node(conn, parent)?.ok_or(Error::NotFound {
        kind: "live tree node",
        id: parent,
    })?;

    let node = TreeNode {
        tree: LIVE_TREE,
        child,
        parent,
        lft: parent_node.rgt,
        rgt: parent_node.rgt + 1,
        depth: parent_node.depth + 1,
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::repository("insert_node", e))?;
    tx.execute(
        "UPDATE tree
         SET lft = CASE WHEN lft > ?1 THEN lft + 2 ELSE lft END,
             rgt = CASE WHEN rgt >= ?1 THEN rgt + 2 ELSE rgt END
         WHERE tree = ?2",
        params![parent_node.rgt, LIVE_TREE],
    )
    .map_err(|e| Error::repository("insert_node", e))?;
    tx.execute(
        &format!("INSERT INTO tree ({NODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![node.tree, node.child, node.parent, node.lft, node.rgt, node.depth],
    )
    .map_err(|e| Error::repository("insert_node", e))?;
    tx.commit()
        .map_err(|e| Error::repository("insert_node", e))?;

    Ok(node)
}

/// Loads `top` and every node reachable from it through parent links within
/// the same tree, ordered top-down.
pub fn collect_subtree(conn: &Connection, top: &TreeNode) -> Result<Vec<TreeNode>> {
    let mut stmt = conn
        .prepare(&format!(
            "WITH RECURSIVE sub(child) AS (
                 SELECT ?1
                 UNION
                 SELECT t.child FROM tree t JOIN sub ON t.parent = sub.child
                 WHERE t.tree = ?2
             )
             SELECT {NODE_COLUMNS} FROM tree
             WHERE tree = ?2 AND child IN (SELECT child FROM sub)"
        ))
        .map_err(|e| Error::repository("prepare_subtree", e))?;

    let nodes = stmt
        .query_map(params![top.child, top.tree], node_from_row)
        .map_err(|e| Error::repository("subtree", e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::repository("subtree", e))?;

    Ok(order_subtree(top, nodes))
}

/// Orders a subtree depth-first from `top`, siblings by `lft`.
///
/// Parents always precede their children. Nodes unreachable from `top` and
/// repeated visits (cycles) are dropped.
#[must_use]
pub fn order_subtree(top: &TreeNode, nodes: Vec<TreeNode>) -> Vec<TreeNode> {
    let children = children_by_parent(nodes.into_iter().filter(|n| n.child != top.child));

    let mut ordered = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![*top];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.child) {
            continue;
        }
        ordered.push(node);
        if let Some(kids) = children.get(&node.child) {
            stack.extend(kids.iter().rev().copied());
        }
    }

    ordered
}

/// Recomputes `lft`, `rgt` and `depth` for the live subtree under `root`.
///
/// Numbering starts at the root's current `lft` and `depth`, so renumbering
/// a non-root subtree keeps it anchored. Returns the number of nodes written.
pub fn renumber(conn: &Connection, root: RefId) -> Result<usize> {
    let root_node = live_node(conn, root)?.ok_or(Error::NotFound {
        kind: "live tree node",
        id: root,
    })?;

    let mut stmt = conn
        .prepare(&format!("SELECT {NODE_COLUMNS} FROM tree WHERE tree = ?1"))
        .map_err(|e| Error::repository("prepare_renumber", e))?;
    let live = stmt
        .query_map(params![LIVE_TREE], node_from_row)
        .map_err(|e| Error::repository("renumber", e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::repository("renumber", e))?;
    drop(stmt);

    let keys = compute_keys(&root_node, live);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::repository("renumber", e))?;
    for (child, (lft, rgt, depth)) in &keys {
        tx.execute(
            "UPDATE tree SET lft = ?1, rgt = ?2, depth = ?3 WHERE child = ?4 AND tree = ?5",
            params![lft, rgt, depth, child, LIVE_TREE],
        )
        .map_err(|e| Error::repository("renumber", e))?;
    }
    tx.commit()
        .map_err(|e| Error::repository("renumber", e))?;

    Ok(keys.len())
}

/// Assigns gap-free `(lft, rgt, depth)` keys below `root`.
fn compute_keys(root: &TreeNode, live: Vec<TreeNode>) -> HashMap<RefId, (i64, i64, i64)> {
    enum Step {
        Enter(RefId, i64),
        Exit(RefId),
    }

    let children = children_by_parent(live.into_iter().filter(|n| n.child != root.child));
    let mut keys: HashMap<RefId, (i64, i64, i64)> = HashMap::new();
    let mut visited = HashSet::new();
    let mut counter = root.lft;
    let mut stack = vec![Step::Enter(root.child, root.depth)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(child, depth) => {
                if !visited.insert(child) {
                    continue;
                }
                keys.insert(child, (counter, counter, depth));
                counter += 1;
                stack.push(Step::Exit(child));
                if let Some(kids) = children.get(&child) {
                    stack.extend(kids.iter().rev().map(|k| Step::Enter(k.child, depth + 1)));
                }
            },
            Step::Exit(child) => {
                if let Some(entry) = keys.get_mut(&child) {
                    entry.1 = counter;
                }
                counter += 1;
            },
        }
    }

    keys
}

/// Groups nodes by parent, each group sorted by `(lft, child)`.
fn children_by_parent(nodes: impl Iterator<Item = TreeNode>) -> HashMap<RefId, Vec<TreeNode>> {
    let mut children: HashMap<RefId, Vec<TreeNode>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent).or_default().push(node);
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|n| (n.lft, n.child));
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::schema::initialize_schema;

    fn node(child: RefId, parent: RefId, lft: i64, rgt: i64, depth: i64) -> TreeNode {
        TreeNode {
            tree: LIVE_TREE,
            child,
            parent,
            lft,
            rgt,
            depth,
        }
    }

    fn setup(nodes: &[TreeNode]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        for n in nodes {
            conn.execute(
                &format!("INSERT INTO tree ({NODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![n.tree, n.child, n.parent, n.lft, n.rgt, n.depth],
            )
            .unwrap();
        }
        conn
    }

    fn keys_of(conn: &Connection, child: RefId) -> (i64, i64, i64) {
        let n = live_node(conn, child).unwrap().unwrap();
        (n.lft, n.rgt, n.depth)
    }

    #[test]
    fn test_insert_last_child_shifts_right_side() {
        // 1(1,6) -> 2(2,3), 3(4,5)
        let conn = setup(&[node(1, 0, 1, 6, 1), node(2, 1, 2, 3, 2), node(3, 1, 4, 5, 2)]);

        let inserted = insert_last_child(&conn, 10, 2).unwrap();
        assert_eq!((inserted.lft, inserted.rgt, inserted.depth), (3, 4, 3));

        assert_eq!(keys_of(&conn, 1), (1, 8, 1));
        assert_eq!(keys_of(&conn, 2), (2, 5, 2));
        assert_eq!(keys_of(&conn, 3), (6, 7, 2));
    }

    #[test]
    fn test_insert_last_child_errors() {
        let conn = setup(&[node(1, 0, 1, 4, 1), node(2, 1, 2, 3, 2)]);

        let err = insert_last_child(&conn, 5, 99).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));

        let err = insert_last_child(&conn, 2, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_order_subtree_parents_first_siblings_by_lft() {
        let top = node(10, 99, 20, 29, 3);
        let nodes = vec![
            node(13, 11, 24, 25, 5),
            node(12, 10, 27, 28, 4),
            top,
            node(11, 10, 21, 26, 4),
            node(14, 11, 22, 23, 5),
        ];

        let order: Vec<RefId> = order_subtree(&top, nodes).iter().map(|n| n.child).collect();
        assert_eq!(order, vec![10, 11, 14, 13, 12]);
    }

    #[test]
    fn test_order_subtree_survives_cycles() {
        let top = node(10, 99, 1, 2, 1);
        let nodes = vec![top, node(11, 10, 3, 4, 2), node(10, 11, 5, 6, 3)];
        let order: Vec<RefId> = order_subtree(&top, nodes).iter().map(|n| n.child).collect();
        assert_eq!(order, vec![10, 11]);
    }

    #[test]
    fn test_collect_subtree_follows_parent_links_within_tree() {
        let conn = setup(&[
            node(1, 0, 1, 10, 1),
            node(5, 404, 2, 7, 2),
            node(6, 5, 3, 4, 3),
            node(7, 5, 5, 6, 3),
            node(8, 1, 8, 9, 2),
            TreeNode {
                tree: -5,
                child: 9,
                parent: 5,
                lft: 0,
                rgt: 0,
                depth: 0,
            },
        ]);

        let top = live_node(&conn, 5).unwrap().unwrap();
        let subtree: Vec<RefId> = collect_subtree(&conn, &top)
            .unwrap()
            .iter()
            .map(|n| n.child)
            .collect();
        assert_eq!(subtree, vec![5, 6, 7]);
    }

    #[test]
    fn test_renumber_closes_gaps() {
        // Gaps left by deleted nodes: 1(1,20) -> 2(4,9) -> 3(6,7); 4(12,13)
        let conn = setup(&[
            node(1, 0, 1, 20, 1),
            node(2, 1, 4, 9, 2),
            node(3, 2, 6, 7, 3),
            node(4, 1, 12, 13, 2),
        ]);

        assert_eq!(renumber(&conn, 1).unwrap(), 4);

        assert_eq!(keys_of(&conn, 1), (1, 8, 1));
        assert_eq!(keys_of(&conn, 2), (2, 5, 2));
        assert_eq!(keys_of(&conn, 3), (3, 4, 3));
        assert_eq!(keys_of(&conn, 4), (6, 7, 2));
    }

    #[test]
    fn test_renumber_unknown_root() {
        let conn = setup(&[node(1, 0, 1, 2, 1)]);
        assert!(matches!(
            renumber(&conn, 2),
            Err(Error::NotFound { id: 2, .. })
        ));
    }
}
