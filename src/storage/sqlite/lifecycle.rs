//! Object lifecycle and permission handling for [`SqliteRepository`].

use rusqlite::{Connection, OptionalExtension, params};

use super::nested_set;
use super::repository::{SqliteRepository, insert_reference};
use crate::models::{NewObject, ObjectId, RefId};
use crate::storage::traits::{ObjectLifecycle, PermissionProvider};
use crate::{Error, Result};

fn object_of(conn: &Connection, ref_id: RefId) -> Result<Option<(ObjectId, String)>> {
    conn.query_row(
        "SELECT o.obj_id, o.type FROM object_reference r
         JOIN object_data o ON o.obj_id = r.obj_id
         WHERE r.ref_id = ?1",
        params![ref_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(|e| Error::repository("object_of", e))
}

impl ObjectLifecycle for SqliteRepository {
    fn object_type(&self, ref_id: RefId) -> Result<Option<String>> {
        self.with_conn("object_type", |conn| {
            Ok(object_of(conn, ref_id)?.map(|(_, object_type)| object_type))
        })
    }

    fn create_object(&self, object: &NewObject) -> Result<ObjectId> {
        self.with_conn("create_object", |conn| {
            conn.execute(
                "INSERT INTO object_data (type, title, description, create_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    object.object_type,
                    object.title,
                    object.description,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| Error::repository("create_object", e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn create_reference(&self, obj_id: ObjectId) -> Result<RefId> {
        self.with_conn("create_reference", |conn| {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS (SELECT 1 FROM object_data WHERE obj_id = ?1)",
                    params![obj_id],
                    |row| row.get(0),
                )
                .map_err(|e| Error::repository("create_reference", e))?;
            if !exists {
                return Err(Error::NotFound {
                    kind: "object",
                    id: obj_id,
                });
            }
            insert_reference(conn, obj_id)
        })
    }

    fn attach_to_tree(&self, ref_id: RefId, parent: RefId) -> Result<()> {
        self.with_conn("attach_to_tree", |conn| {
            nested_set::insert_last_child(conn, ref_id, parent).map(|_| ())
        })
    }

    fn delete_object(&self, ref_id: RefId) -> Result<()> {
        self.with_conn("delete_object", |conn| {
            let (obj_id, _) = object_of(conn, ref_id)?.ok_or(Error::NotFound {
                kind: "reference",
                id: ref_id,
            })?;

            let map_err = |e: rusqlite::Error| Error::repository("delete_object", e);
            let tx = conn.unchecked_transaction().map_err(map_err)?;
            tx.execute(
                "DELETE FROM tree WHERE child IN
                 (SELECT ref_id FROM object_reference WHERE obj_id = ?1)",
                params![obj_id],
            )
            .map_err(map_err)?;
            tx.execute(
                "DELETE FROM rbac_pa WHERE ref_id IN
                 (SELECT ref_id FROM object_reference WHERE obj_id = ?1)",
                params![obj_id],
            )
            .map_err(map_err)?;
            tx.execute(
                "DELETE FROM object_reference WHERE obj_id = ?1",
                params![obj_id],
            )
            .map_err(map_err)?;
            tx.execute("DELETE FROM object_data WHERE obj_id = ?1", params![obj_id])
                .map_err(map_err)?;
            tx.commit().map_err(map_err)?;

            tracing::debug!(ref_id, obj_id, "Deleted object");
            Ok(())
        })
    }
}

impl PermissionProvider for SqliteRepository {
    fn revoke(&self, ref_id: RefId) -> Result<usize> {
        self.with_conn("revoke_permissions", |conn| {
            conn.execute("DELETE FROM rbac_pa WHERE ref_id = ?1", params![ref_id])
                .map_err(|e| Error::repository("revoke_permissions", e))
        })
    }

    fn apply_baseline(&self, ref_id: RefId, rooted_at: RefId) -> Result<usize> {
        if ref_id == rooted_at {
            return Ok(0);
        }
        self.with_conn("apply_baseline", |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO rbac_pa (rol_id, ref_id, ops)
                 SELECT rol_id, ?1, ops FROM rbac_pa WHERE ref_id = ?2",
                params![ref_id, rooted_at],
            )
            .map_err(|e| Error::repository("apply_baseline", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RepositoryGateway;
    use crate::storage::sqlite::test_support::seeded;

    #[test]
    fn test_create_and_attach() {
        let repo = seeded();
        let obj_id = repo
            .create_object(&NewObject::new("cat").with_title("__Restored Objects"))
            .unwrap();
        let ref_id = repo.create_reference(obj_id).unwrap();
        repo.attach_to_tree(ref_id, 1).unwrap();

        assert_eq!(repo.object_type(ref_id).unwrap().as_deref(), Some("cat"));
        assert_eq!(repo.find_reference_by_title("__Restored Objects").unwrap(), Some(ref_id));
        let node = repo.node_data(ref_id).unwrap().unwrap().node;
        assert_eq!(node.parent, 1);
        assert_eq!(node.depth, 2);
        assert!(repo.object(obj_id).unwrap().unwrap().title.starts_with("__Restored"));
    }

    #[test]
    fn test_create_reference_for_missing_object() {
        let repo = seeded();
        assert!(matches!(
            repo.create_reference(404),
            Err(Error::NotFound { kind: "object", id: 404 })
        ));
    }

    #[test]
    fn test_delete_object_removes_all_references() {
        let repo = seeded();
        repo.execute_batch(
            "INSERT INTO object_reference (ref_id, obj_id) VALUES (9, 3);
             INSERT INTO tree VALUES (-9, 9, 1, 0, 0, 2);
             INSERT INTO rbac_pa VALUES (2, 4, 'read');",
        )
        .unwrap();

        repo.delete_object(4).unwrap();
        assert!(repo.object(3).unwrap().is_none());
        assert!(repo.references_of(3).unwrap().is_empty());
        assert!(repo.tree_nodes_of(4).unwrap().is_empty());
        assert!(repo.tree_nodes_of(9).unwrap().is_empty());
        assert_eq!(repo.revoke(4).unwrap(), 0);
    }

    #[test]
    fn test_delete_object_unknown_reference() {
        let repo = seeded();
        assert!(matches!(
            repo.delete_object(404),
            Err(Error::NotFound { kind: "reference", .. })
        ));
    }

    #[test]
    fn test_revoke_and_baseline() {
        let repo = seeded();
        repo.execute_batch(
            "INSERT INTO rbac_pa VALUES (2, 1, 'visible,read');
             INSERT INTO rbac_pa VALUES (3, 1, 'visible');
             INSERT INTO rbac_pa VALUES (7, 4, 'write');",
        )
        .unwrap();

        assert_eq!(repo.revoke(4).unwrap(), 1);
        assert_eq!(repo.apply_baseline(4, 1).unwrap(), 2);
        assert_eq!(repo.apply_baseline(1, 1).unwrap(), 0);
        assert_eq!(repo.revoke(4).unwrap(), 2);
    }
}
