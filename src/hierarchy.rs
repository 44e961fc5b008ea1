use crate::error::{Result, SalesPerformanceError};
use crate::ingestion::HierarchyRow;
use crate::schema::{PerformanceNode, Role};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyBuild {
    /// Top-level senior manager nodes in first-seen order.
    pub senior_managers: Vec<PerformanceNode>,
    pub skipped_rows: Vec<usize>,
}

/// Builds the Senior Manager -> Regional Manager -> Account Owner tiers.
///
/// Nodes are deduplicated by id within each tier: the first row that mentions
/// an id decides its name, region and position. Rows without a senior or
/// owner id are skipped and reported back. A blank regional id still yields a
/// regional node, keyed by the blank id, so the owner stays reachable.
pub fn build_hierarchy(rows: &[HierarchyRow]) -> HierarchyBuild {
    let mut build = HierarchyBuild::default();
    let mut senior_index: HashMap<String, usize> = HashMap::new();
    let mut regional_index: HashMap<String, (usize, usize)> = HashMap::new();
    let mut owners: HashSet<String> = HashSet::new();

    for row in rows {
        if row.senior_id.is_empty() || row.owner_id.is_empty() {
            warn!("Skipping hierarchy row {}: missing senior or owner id", row.line);
            build.skipped_rows.push(row.line);
            continue;
        }

        let senior_pos = *senior_index.entry(row.senior_id.clone()).or_insert_with(|| {
            build.senior_managers.push(PerformanceNode::new(
                row.senior_id.clone(),
                row.senior_name.clone(),
                Role::SeniorManager,
                row.senior_region.clone(),
            ));
            build.senior_managers.len() - 1
        });

        if row.regional_id.is_empty() {
            warn!("Hierarchy row {} has no regional manager id", row.line);
        }

        let (s_idx, r_idx) = *regional_index
            .entry(row.regional_id.clone())
            .or_insert_with(|| {
                let senior = &mut build.senior_managers[senior_pos];
                senior.children.push(PerformanceNode::new(
                    row.regional_id.clone(),
                    row.regional_name.clone(),
                    Role::RegionalManager,
                    row.regional_region.clone(),
                ));
                (senior_pos, senior.children.len() - 1)
            });

        if owners.insert(row.owner_id.clone()) {
            build.senior_managers[s_idx].children[r_idx]
                .children
                .push(PerformanceNode::new(
                    row.owner_id.clone(),
                    row.owner_name.clone(),
                    Role::AccountOwner,
                    row.owner_region.clone(),
                ));
        }
    }

    debug!(
        "Built hierarchy: {} senior managers, {} regional managers, {} account owners",
        build.senior_managers.len(),
        regional_index.len(),
        owners.len()
    );
    build
}

/// Id -> display name for every person mentioned in the hierarchy sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameLookup {
    names: HashMap<String, String>,
}

impl NameLookup {
    pub fn contains(&self, id: &str) -> bool {
        self.names.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn resolve(&self, id: &str, placeholder: &str) -> String {
        self.get(id).unwrap_or(placeholder).to_string()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Includes rows the tree builder skips, so a partially filled row still
/// contributes the names it does carry.
pub fn build_name_lookup(rows: &[HierarchyRow]) -> NameLookup {
    let mut names = HashMap::new();
    for row in rows {
        for (id, name) in [
            (&row.owner_id, &row.owner_name),
            (&row.regional_id, &row.regional_name),
            (&row.senior_id, &row.senior_name),
        ] {
            if !id.is_empty() {
                names.entry(id.clone()).or_insert_with(|| name.clone());
            }
        }
    }
    NameLookup { names }
}

pub fn find_node<'a>(root: &'a PerformanceNode, id: &str) -> Option<&'a PerformanceNode> {
    if root.id == id {
        return Some(root);
    }
    root.children.iter().find_map(|child| find_node(child, id))
}

pub fn find_parent<'a>(root: &'a PerformanceNode, id: &str) -> Option<&'a PerformanceNode> {
    if root.children.iter().any(|c| c.id == id) {
        return Some(root);
    }
    root.children.iter().find_map(|child| find_parent(child, id))
}

/// Pre-order list of every id in the tree.
pub fn collect_ids(root: &PerformanceNode) -> Vec<String> {
    let mut ids = vec![root.id.clone()];
    for child in &root.children {
        ids.extend(collect_ids(child));
    }
    ids
}

fn with_children(node: &PerformanceNode, children: Vec<PerformanceNode>) -> PerformanceNode {
    PerformanceNode {
        id: node.id.clone(),
        name: node.name.clone(),
        role: node.role,
        region: node.region.clone(),
        consignment: node.consignment.clone(),
        revenue: node.revenue.clone(),
        yields: node.yields,
        customer_stats: node.customer_stats,
        children,
    }
}

fn without_node(node: &PerformanceNode, id: &str) -> PerformanceNode {
    let children = node
        .children
        .iter()
        .filter(|c| c.id != id)
        .map(|c| without_node(c, id))
        .collect();
    with_children(node, children)
}

fn with_inserted(
    node: &PerformanceNode,
    parent_id: &str,
    new_node: &PerformanceNode,
) -> PerformanceNode {
    let mut children: Vec<PerformanceNode> = node
        .children
        .iter()
        .map(|c| with_inserted(c, parent_id, new_node))
        .collect();
    if node.id == parent_id {
        children.push(new_node.clone());
    }
    with_children(node, children)
}

/// Returns a copy of `root` without the subtree rooted at `id`.
///
/// The builder deduplicates per tier, so one id can sit at two tiers (a
/// regional manager who also owns accounts). Every node carrying `id` is
/// removed, while [`find_node`] only reports the first one in pre-order.
pub fn remove_node(root: &PerformanceNode, id: &str) -> Result<PerformanceNode> {
    if root.id == id {
        return Err(SalesPerformanceError::RootDeletion(id.to_string()));
    }
    if find_node(root, id).is_none() {
        return Err(SalesPerformanceError::UserNotFound(id.to_string()));
    }
    Ok(without_node(root, id))
}

/// Returns a copy of `root` with `node` appended to the children of `parent_id`.
///
/// The new node must have the role directly below its parent, and none of the
/// ids in its subtree may already exist in the tree.
pub fn insert_node(
    root: &PerformanceNode,
    parent_id: &str,
    node: PerformanceNode,
) -> Result<PerformanceNode> {
    let parent = find_node(root, parent_id)
        .ok_or_else(|| SalesPerformanceError::UserNotFound(parent_id.to_string()))?;

    check_placement(parent, node.role)?;
    validate_tree(&node)?;

    let existing: HashSet<String> = collect_ids(root).into_iter().collect();
    if let Some(duplicate) = collect_ids(&node).into_iter().find(|id| existing.contains(id)) {
        return Err(SalesPerformanceError::DuplicateNode(duplicate));
    }

    Ok(with_inserted(root, parent_id, &node))
}

fn check_placement(parent: &PerformanceNode, role: Role) -> Result<()> {
    match parent.role.child_role() {
        None => Err(SalesPerformanceError::InvalidPlacement {
            parent: parent.id.clone(),
            reason: format!("{} nodes cannot have subordinates", parent.role),
        }),
        Some(expected) if expected != role => Err(SalesPerformanceError::InvalidPlacement {
            parent: parent.id.clone(),
            reason: format!("expected a {} but got a {}", expected, role),
        }),
        Some(_) => Ok(()),
    }
}

/// Checks the shape of a whole tree: every child has the role directly below
/// its parent and no id repeats within a tier.
pub fn validate_tree(root: &PerformanceNode) -> Result<()> {
    fn walk(node: &PerformanceNode, seen: &mut HashSet<(Role, String)>) -> Result<()> {
        if !seen.insert((node.role, node.id.clone())) {
            return Err(SalesPerformanceError::DuplicateNode(node.id.clone()));
        }
        for child in &node.children {
            check_placement(node, child.role)?;
            walk(child, seen)?;
        }
        Ok(())
    }

    walk(root, &mut HashSet::new())
}

/// Returns a copy of `root` with the name and/or region of `id` replaced.
///
/// Like [`remove_node`], this touches every node carrying `id`.
pub fn rename_node(
    root: &PerformanceNode,
    id: &str,
    name: Option<&str>,
    region: Option<&str>,
) -> Result<PerformanceNode> {
    if find_node(root, id).is_none() {
        return Err(SalesPerformanceError::UserNotFound(id.to_string()));
    }

    fn rename(
        node: &PerformanceNode,
        id: &str,
        name: Option<&str>,
        region: Option<&str>,
    ) -> PerformanceNode {
        let children = node
            .children
            .iter()
            .map(|c| rename(c, id, name, region))
            .collect();
        let mut copy = with_children(node, children);
        if copy.id == id {
            if let Some(n) = name {
                copy.name = n.to_string();
            }
            if let Some(r) = region {
                copy.region = r.to_string();
            }
        }
        copy
    }

    Ok(rename(root, id, name, region))
}
