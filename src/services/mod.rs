//! Business logic services.
//!
//! Services orchestrate the storage backends and provide high-level
//! operations.

pub mod validation;

pub use validation::{Outcome, RestoreReport, RunSummary, ValidatorService};
