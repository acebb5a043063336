//! Permission provider trait.

use crate::Result;
use crate::models::RefId;

/// Minimal access to the permission subsystem.
pub trait PermissionProvider: Send + Sync {
    /// Removes every permission assignment on `ref_id`.
    ///
    /// Returns the number of assignments removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn revoke(&self, ref_id: RefId) -> Result<usize>;

    /// Gives `ref_id` the permission baseline of `rooted_at`.
    ///
    /// Returns the number of assignments written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn apply_baseline(&self, ref_id: RefId, rooted_at: RefId) -> Result<usize>;
}
