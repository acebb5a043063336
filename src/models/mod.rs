//! Data models for treeguard.
//!
//! Rows of the three repository tables, the transient validation report and
//! the mode switches that gate every operation.

mod mode;
mod records;
mod report;

pub use mode::{ALL_MODES, Mode, ModeController, parse_bool};
pub use records::{
    LIVE_TREE, NewObject, NodeData, ObjectId, ObjectRecord, ROOT_PARENT, RefId, ReferenceRecord,
    TreeNode,
};
pub use report::{
    InvalidParentEntry, MissingObjectEntry, ParentState, UnboundChildEntry, UnboundReferenceEntry,
    ValidationReport, entries_from_json,
};
