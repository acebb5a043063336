//! # Treeguard
//!
//! Integrity validator and recovery tool for hierarchical object repositories.
//!
//! A repository is persisted across three relational structures: an object
//! table, a reference table (one object may appear under many references) and
//! a nested-set tree table keyed on reference ids. Treeguard detects the four
//! classes of structural corruption that accumulate in such a layout, deletes
//! rows that cannot be salvaged and re-attaches recoverable objects and whole
//! subtrees under a dedicated recovery folder.
//!
//! ## Features
//!
//! - Four independent, read-only scans (missing objects, unbound references,
//!   unbound tree childs, childs with an invalid parent)
//! - Mode-gated cleaning, restoring and trash purging
//! - Subtree relocation that keeps the internal shape of the moved subtree
//! - Nested-set renumbering to close gaps left by deletions
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use treeguard::{Mode, ValidatorConfig, ValidatorService};
//! use treeguard::storage::SqliteRepository;
//!
//! let repo = Arc::new(SqliteRepository::new("repository.db")?);
//! let mut validator = ValidatorService::with_repository(repo, ValidatorConfig::default());
//! validator.modes_mut().set("all", true)?;
//!
//! let summary = validator.run()?;
//! println!("{}", summary.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::ValidatorConfig;
pub use models::{
    InvalidParentEntry, MissingObjectEntry, Mode, ModeController, ObjectId, RefId, TreeNode,
    UnboundChildEntry, UnboundReferenceEntry, ValidationReport,
};
pub use services::validation::{Outcome, RestoreReport, RunSummary, ValidatorService};
pub use storage::{ObjectLifecycle, PermissionProvider, RepositoryGateway};

/// Error type for treeguard operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidParameter` | Non-boolean mode value, malformed report override, bad id |
/// | `UnknownMode` | Querying a mode name outside the fixed set |
/// | `Repository` | Any `SQLite` failure (constraint violation, I/O, locking) |
/// | `NotFound` | A row an operation depends on has disappeared |
/// | `Init` | Logging could not be installed |
///
/// A disabled mode is not an error; gated operations return
/// [`Outcome::Skipped`] instead.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An argument had the wrong type or shape.
    ///
    /// The call is aborted before any mutation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A mode name outside `analyze`, `clean`, `restore`, `empty_trash`.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// A repository read or write failed.
    #[error("repository operation '{operation}' failed: {cause}")]
    Repository {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A row required by the operation does not exist (anymore).
    #[error("{kind} {id} not found")]
    NotFound {
        /// What kind of row was looked up.
        kind: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// Process setup (logging) failed.
    #[error("initialization failed: {0}")]
    Init(String),
}

impl Error {
    /// Builds a [`Error::Repository`] from an operation name and a cause.
    pub fn repository(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Repository {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for treeguard operations.
pub type Result<T> = std::result::Result<T, Error>;
