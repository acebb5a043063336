//! Storage backend traits.
//!
//! The validator only talks to the repository through these three seams,
//! injected at construction as `Arc<dyn _>`.

mod gateway;
mod lifecycle;
mod permission;

pub use gateway::{RepositoryGateway, TrashPurge};
pub use lifecycle::ObjectLifecycle;
pub use permission::PermissionProvider;
