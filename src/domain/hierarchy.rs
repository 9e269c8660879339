//! Hierarchy introspection view models

use super::access::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Compact role reference used in tree nodes and issue reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    pub level: i32,
}

impl From<&Role> for RoleSummary {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            level: role.level,
        }
    }
}

/// One role's entry in the hierarchy tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleNode {
    pub role: RoleSummary,
    pub display_name: String,
    pub permission_count: usize,
    pub user_count: usize,
    /// Ancestors this role inherits from, most privileged first
    pub inherits_from: Vec<RoleSummary>,
}

/// Active roles bucketed by privilege level, ascending (most privileged
/// bucket first). Administrative visualization only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleHierarchyTree {
    pub levels: BTreeMap<i32, Vec<RoleNode>>,
}

impl RoleHierarchyTree {
    pub fn role_count(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// All nodes, most privileged level first
    pub fn iter_nodes(&self) -> impl Iterator<Item = &RoleNode> {
        self.levels.values().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    CircularInheritance,
    LevelInconsistency,
}

/// Diagnostic finding from hierarchy validation. Advisory only: issues are
/// reported, resolution keeps running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyIssue {
    pub kind: IssueKind,
    pub role: RoleSummary,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_counts_and_order() {
        let mut tree = RoleHierarchyTree::default();
        for (name, level) in [("editor", 30), ("admin", 10), ("viewer", 30)] {
            let role = Role {
                name: name.to_string(),
                level,
                ..Default::default()
            };
            tree.levels.entry(level).or_default().push(RoleNode {
                role: RoleSummary::from(&role),
                display_name: name.to_string(),
                permission_count: 0,
                user_count: 0,
                inherits_from: vec![],
            });
        }

        assert_eq!(tree.role_count(), 3);
        // buckets iterate most privileged (lowest level) first
        let first = tree.iter_nodes().next().unwrap();
        assert_eq!(first.role.name, "admin");
    }

    #[test]
    fn test_issue_kind_serialization() {
        let json = serde_json::to_string(&IssueKind::CircularInheritance).unwrap();
        assert_eq!(json, "\"circular_inheritance\"");
    }
}
