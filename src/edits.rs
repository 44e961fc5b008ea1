use crate::error::{Result, SalesPerformanceError};
use crate::hierarchy::{find_node, insert_node, remove_node, rename_node};
use crate::schema::{PerformanceNode, Role};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single structural change to one snapshot's management tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HierarchyEdit {
    /// Add a new member under an existing manager.
    Insert {
        #[schemars(description = "Id of the manager that receives the new subordinate.")]
        parent_id: String,
        id: String,
        name: String,
        role: Role,
        region: String,
    },

    /// Delete a member together with everyone reporting to them.
    Remove { id: String },

    /// Change display name and/or region.
    Rename {
        id: String,
        new_name: Option<String>,
        new_region: Option<String>,
    },

    /// Re-parent a member (and their subtree) under another manager.
    Move { id: String, new_parent_id: String },
}

impl HierarchyEdit {
    /// Applies the edit to a copy of `tree`. On error `tree` is untouched and
    /// nothing is returned.
    pub fn apply(&self, tree: &PerformanceNode) -> Result<PerformanceNode> {
        match self {
            HierarchyEdit::Insert {
                parent_id,
                id,
                name,
                role,
                region,
            } => insert_node(
                tree,
                parent_id,
                PerformanceNode::new(id.clone(), name.clone(), *role, region.clone()),
            ),

            HierarchyEdit::Remove { id } => remove_node(tree, id),

            HierarchyEdit::Rename {
                id,
                new_name,
                new_region,
            } => rename_node(tree, id, new_name.as_deref(), new_region.as_deref()),

            HierarchyEdit::Move { id, new_parent_id } => {
                if tree.id == *id {
                    return Err(SalesPerformanceError::RootDeletion(id.clone()));
                }
                let subtree = find_node(tree, id)
                    .ok_or_else(|| SalesPerformanceError::UserNotFound(id.clone()))?
                    .clone();
                if find_node(&subtree, new_parent_id).is_some() {
                    return Err(SalesPerformanceError::InvalidPlacement {
                        parent: new_parent_id.clone(),
                        reason: format!("'{}' cannot be moved beneath itself", id),
                    });
                }
                let detached = remove_node(tree, id)?;
                insert_node(&detached, new_parent_id, subtree)
            }
        }
    }
}

/// Applies edits in order; the first failure aborts and nothing is applied.
pub fn apply_edits(tree: &PerformanceNode, edits: &[HierarchyEdit]) -> Result<PerformanceNode> {
    edits
        .iter()
        .try_fold(tree.clone(), |current, edit| edit.apply(&current))
}
