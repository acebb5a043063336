//! Validation report types.
//!
//! Reports are transient: the analyzer fills them, the cleaner and restorer
//! consume them within the same run. Nothing here is persisted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::records::{ObjectId, RefId};
use crate::{Error, Result};

/// An object that has no reference, or whose reference has no tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingObjectEntry {
    /// The object lacking a reference or a tree entry.
    pub obj_id: ObjectId,
    /// Symbolic object type.
    #[serde(rename = "type")]
    pub object_type: String,
    /// Existing reference, `None` when a new reference must be created.
    pub ref_id: Option<RefId>,
    /// Tree child found for the reference. Always `None`; kept for verification.
    #[serde(default)]
    pub child: Option<RefId>,
}

impl MissingObjectEntry {
    /// Returns `true` if the object has no reference row at all.
    #[must_use]
    pub const fn needs_reference(&self) -> bool {
        self.ref_id.is_none()
    }
}

/// A reference whose object is absent or not of a valid RBAC type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnboundReferenceEntry {
    /// The dangling reference.
    pub ref_id: RefId,
    /// The object id it points at.
    pub obj_id: ObjectId,
}

/// A tree node whose child does not resolve to any reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnboundChildEntry {
    /// Child id of the orphaned tree row.
    pub child: RefId,
    /// Parent id recorded on that row.
    #[serde(default)]
    pub parent: RefId,
    /// Tree discriminator of that row.
    #[serde(default)]
    pub tree: i64,
}

/// Where the parent of an [`InvalidParentEntry`] went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentState {
    /// The parent node exists but belongs to a trashed subtree.
    InTrash,
    /// The parent node does not exist at all.
    Missing,
}

impl ParentState {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InTrash => "in-trash",
            Self::Missing => "missing",
        }
    }
}

/// A live tree node whose parent is not part of the live tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParentEntry {
    /// The node with the broken uplink.
    pub child: RefId,
    /// The parent id it points at.
    pub parent: RefId,
    /// Parent of the parent, where the path to root would continue.
    #[serde(default)]
    pub grandparent: Option<RefId>,
    /// Tree discriminator of the parent node, `None` if the parent is absent.
    #[serde(default)]
    pub parent_tree: Option<i64>,
}

impl InvalidParentEntry {
    /// Classifies the broken parent for reporting.
    #[must_use]
    pub const fn parent_state(&self) -> ParentState {
        match self.parent_tree {
            Some(_) => ParentState::InTrash,
            None => ParentState::Missing,
        }
    }
}

/// The four result sets of an analyze pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Objects lacking a reference or a tree entry.
    pub missing_objects: Vec<MissingObjectEntry>,
    /// References pointing at nonexistent or out-of-scope objects.
    pub unbound_references: Vec<UnboundReferenceEntry>,
    /// Tree nodes whose child reference is absent.
    pub unbound_childs: Vec<UnboundChildEntry>,
    /// Live tree nodes whose parent is not in the live tree.
    pub invalid_parent_entries: Vec<InvalidParentEntry>,
}

impl ValidationReport {
    /// Returns `true` if no scan found anything.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// Total number of findings across all four lists.
    #[must_use]
    pub fn total(&self) -> usize {
        self.missing_objects.len()
            + self.unbound_references.len()
            + self.unbound_childs.len()
            + self.invalid_parent_entries.len()
    }

    /// Clears all four lists.
    pub fn clear(&mut self) {
        self.missing_objects.clear();
        self.unbound_references.clear();
        self.unbound_childs.clear();
        self.invalid_parent_entries.clear();
    }
}

/// Parses a caller-supplied report override.
///
/// The value must be a JSON array whose elements deserialize into `T`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `value` is not an array or any
/// element is malformed.
pub fn entries_from_json<T: DeserializeOwned>(
    value: &serde_json::Value,
    what: &str,
) -> Result<Vec<T>> {
    let Some(items) = value.as_array() else {
        return Err(Error::InvalidParameter(format!(
            "{what} override must be a list, got {}",
            json_kind(value)
        )));
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_json::from_value(item.clone()).map_err(|e| {
                Error::InvalidParameter(format!("{what} override entry {idx}: {e}"))
            })
        })
        .collect()
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_state() {
        let trashed = InvalidParentEntry {
            child: 20,
            parent: 12,
            grandparent: Some(1),
            parent_tree: Some(-12),
        };
        assert_eq!(trashed.parent_state(), ParentState::InTrash);

        let gone = InvalidParentEntry {
            parent_tree: None,
            grandparent: None,
            ..trashed
        };
        assert_eq!(gone.parent_state(), ParentState::Missing);
    }

    #[test]
    fn test_report_totals() {
        let mut report = ValidationReport::default();
        assert!(report.is_clean());

        report
            .unbound_references
            .push(UnboundReferenceEntry { ref_id: 50, obj_id: 999 });
        report.unbound_childs.push(UnboundChildEntry {
            child: 77,
            parent: 1,
            tree: 1,
        });
        assert_eq!(report.total(), 2);
        assert!(!report.is_clean());

        report.clear();
        assert!(report.is_clean());
    }

    #[test]
    fn test_entries_from_json_accepts_list() {
        let value = json!([{ "ref_id": 50, "obj_id": 999 }, { "ref_id": 51, "obj_id": 1000 }]);
        let entries: Vec<UnboundReferenceEntry> =
            entries_from_json(&value, "unbound_references").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], UnboundReferenceEntry { ref_id: 50, obj_id: 999 });
    }

    #[test]
    fn test_entries_from_json_rejects_non_list() {
        let err = entries_from_json::<UnboundChildEntry>(&json!({ "child": 3 }), "unbound_childs")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(err.to_string().contains("must be a list, got object"));
    }

    #[test]
    fn test_entries_from_json_rejects_malformed_entry() {
        let err = entries_from_json::<UnboundReferenceEntry>(&json!([{ "ref_id": "x" }]), "refs")
            .unwrap_err();
        assert!(err.to_string().contains("refs override entry 0"));
    }

    #[test]
    fn test_missing_object_serializes_type_field() {
        let entry = MissingObjectEntry {
            obj_id: 7,
            object_type: "fold".to_string(),
            ref_id: None,
            child: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "fold");
        assert!(value["ref_id"].is_null());
        assert!(entry.needs_reference());
    }
}
