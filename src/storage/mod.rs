//! Storage layer abstraction.
//!
//! The validator reaches the repository through three traits:
//! - **Gateway**: scans and row-level writes on objects, references and tree
//! - **Lifecycle**: creating, placing and deleting whole objects
//! - **Permissions**: revoking and re-deriving access on moved nodes
//!
//! [`SqliteRepository`] implements all three over one connection.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow manual_let_else for clearer error handling in some contexts.
#![allow(clippy::manual_let_else)]

pub mod sqlite;
pub mod traits;

pub use sqlite::{SqliteRepository, TableCounts};
pub use traits::{ObjectLifecycle, PermissionProvider, RepositoryGateway, TrashPurge};
