//! Object lifecycle trait.

use crate::Result;
use crate::models::{NewObject, ObjectId, RefId};

/// Creates, places and deletes repository objects.
///
/// Used by the recovery folder resolver and the restorer. Every call is an
/// explicit request; implementations need not cache object handles.
pub trait ObjectLifecycle: Send + Sync {
    /// Type of the object behind `ref_id`, `None` if the reference is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn object_type(&self, ref_id: RefId) -> Result<Option<String>>;

    /// Persists a new object and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn create_object(&self, object: &NewObject) -> Result<ObjectId>;

    /// Creates a reference for an existing object.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn create_reference(&self, obj_id: ObjectId) -> Result<RefId>;

    /// Attaches `ref_id` as last child of `parent` in the live tree.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not a live node or the write fails.
    fn attach_to_tree(&self, ref_id: RefId, parent: RefId) -> Result<()>;

    /// Deletes the object behind `ref_id` together with all its references,
    /// their tree rows and permission assignments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `ref_id` does not resolve, or an
    /// error if the delete fails.
    fn delete_object(&self, ref_id: RefId) -> Result<()>;
}
