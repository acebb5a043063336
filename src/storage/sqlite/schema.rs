//! Repository schema.
//!
//! The tables mirror the layout the validator was built for. No foreign keys
//! are declared: dangling rows are exactly what the scans look for.

use rusqlite::Connection;

use crate::{Error, Result};

/// Creates the repository tables if they do not exist.
///
/// # Errors
///
/// Returns [`Error::Repository`] if a statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Objects
        CREATE TABLE IF NOT EXISTS object_data (
            obj_id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            create_date TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_object_data_type ON object_data(type);
        CREATE INDEX IF NOT EXISTS idx_object_data_title ON object_data(title);

        -- References (one object, many positions)
        CREATE TABLE IF NOT EXISTS object_reference (
            ref_id INTEGER PRIMARY KEY AUTOINCREMENT,
            obj_id INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_object_reference_obj ON object_reference(obj_id);

        -- Nested-set tree; tree = 1 is live, anything else is trash
        CREATE TABLE IF NOT EXISTS tree (
            tree INTEGER NOT NULL,
            child INTEGER NOT NULL,
            parent INTEGER NOT NULL,
            lft INTEGER NOT NULL DEFAULT 0,
            rgt INTEGER NOT NULL DEFAULT 0,
            depth INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tree_child ON tree(child);
        CREATE INDEX IF NOT EXISTS idx_tree_parent ON tree(parent);
        CREATE INDEX IF NOT EXISTS idx_tree_lft ON tree(tree, lft);

        -- Permission assignments
        CREATE TABLE IF NOT EXISTS rbac_pa (
            rol_id INTEGER NOT NULL,
            ref_id INTEGER NOT NULL,
            ops TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (rol_id, ref_id)
        );

        CREATE INDEX IF NOT EXISTS idx_rbac_pa_ref ON rbac_pa(ref_id);
        ",
    )
    .map_err(|e| Error::repository("initialize_schema", e))
}
