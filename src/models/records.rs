//! Repository rows: objects, references and nested-set tree nodes.

use serde::{Deserialize, Serialize};

/// Identifier of a row in the object table.
pub type ObjectId = i64;

/// Identifier of a row in the reference table. Tree nodes are keyed on it.
pub type RefId = i64;

/// Discriminator value of the live tree. Any other value marks trash.
pub const LIVE_TREE: i64 = 1;

/// Parent value of the repository root node.
pub const ROOT_PARENT: RefId = 0;

/// An entry of the object table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object identity.
    pub obj_id: ObjectId,
    /// Short symbolic type, e.g. `cat`, `fold`, `rolf`.
    #[serde(rename = "type")]
    pub object_type: String,
    /// Display title.
    pub title: String,
    /// Free-form description.
    pub description: String,
}

/// An entry of the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Reference identity.
    pub ref_id: RefId,
    /// Referenced object.
    pub obj_id: ObjectId,
}

/// One position in the nested-set tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Tree discriminator; [`LIVE_TREE`] for the live tree.
    pub tree: i64,
    /// Reference id placed at this position.
    pub child: RefId,
    /// Reference id of the parent position, [`ROOT_PARENT`] for the root.
    pub parent: RefId,
    /// Nested-set left key.
    pub lft: i64,
    /// Nested-set right key.
    pub rgt: i64,
    /// Depth below the root (root = 1).
    pub depth: i64,
}

impl TreeNode {
    /// Returns `true` if the node belongs to the live tree.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.tree == LIVE_TREE
    }

    /// Returns `true` if `other` lies inside this node's nested-set interval.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        self.tree == other.tree && other.lft >= self.lft && other.rgt <= self.rgt
    }
}

/// A tree node joined with the object its reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeData {
    /// The tree position.
    pub node: TreeNode,
    /// Object behind `node.child`.
    pub obj_id: ObjectId,
    /// Type of that object.
    pub object_type: String,
    /// Title of that object.
    pub title: String,
}

/// Request to create a new object row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    /// Object type to create.
    pub object_type: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
}

impl NewObject {
    /// Creates a request for an object of the given type.
    #[must_use]
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            title: String::new(),
            description: String::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(tree: i64, child: RefId, lft: i64, rgt: i64) -> TreeNode {
        TreeNode {
            tree,
            child,
            parent: 1,
            lft,
            rgt,
            depth: 2,
        }
    }

    #[test]
    fn test_contains_respects_interval_and_tree() {
        let outer = node(1, 10, 2, 9);
        assert!(outer.contains(&node(1, 11, 3, 4)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&node(1, 12, 10, 11)));
        assert!(!outer.contains(&node(-10, 11, 3, 4)));
    }

    #[test]
    fn test_new_object_builder() {
        let request = NewObject::new("cat")
            .with_title("__Restored Objects")
            .with_description("restored");
        assert_eq!(request.object_type, "cat");
        assert_eq!(request.title, "__Restored Objects");
        assert_eq!(request.description, "restored");
    }
}
