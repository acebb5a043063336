//! Repository validation and recovery.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      ValidatorService                         │
//! │                  (mode gating, last report)                   │
//! │  ┌──────────┐ ┌─────────┐ ┌──────────┐ ┌───────────────────┐  │
//! │  │ Analyzer │ │ Cleaner │ │ Restorer │ │ RecoveryFolder    │  │
//! │  │ 4 scans  │ │ deletes │ │ relocate │ │ Resolver (cached) │  │
//! │  └──────────┘ └─────────┘ └──────────┘ └───────────────────┘  │
//! │  ┌───────────────┐ ┌─────────────┐                            │
//! │  │ TreeCompactor │ │ TrashPurger │                            │
//! │  └───────────────┘ └─────────────┘                            │
//! └───────────────────────────────────────────────────────────────┘
//!              │ RepositoryGateway / ObjectLifecycle / PermissionProvider
//! ```
//!
//! A full pass runs analyze, clean, restore, empty trash and finally closes
//! the gaps the previous steps left in the nested-set numbering.

mod analyzer;
mod cleaner;
mod compactor;
mod recovery;
mod restorer;
mod service;
mod trash;
mod types;

pub use analyzer::Analyzer;
pub use cleaner::Cleaner;
pub use compactor::TreeCompactor;
pub use recovery::RecoveryFolderResolver;
pub use restorer::Restorer;
pub use service::ValidatorService;
pub use trash::TrashPurger;
pub use types::{EntryFailure, Outcome, RestoreReport, RunSummary};
