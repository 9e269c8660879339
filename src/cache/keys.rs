//! Typed cache key builder
//!
//! Every key owned by this crate lives under one root prefix so a full
//! wipe is a single pattern delete. Derived hierarchy entries live under
//! their own sub-prefix because they are cleared together on rebuild,
//! independently of the longer-lived catalog entries.

use uuid::Uuid;

/// Root prefix for every key owned by this crate
pub const ROOT: &str = "hub_access";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    /// Deduplicated direct permissions of a user's active roles (24h tier)
    UserPermissions(Uuid),
    /// Active roles of a user, level ascending (24h tier)
    UserRoles(Uuid),
    /// Active permissions of one role, presentation order (24h tier)
    RolePermissions(Uuid),
    /// Global role catalog (24h tier)
    AllRoles,
    /// Global permission catalog (24h tier)
    AllPermissions,
    /// System role catalog (24h tier)
    SystemRoles,
    /// Effective permissions of a user including inheritance (1h tier)
    UserEffective(Uuid),
    /// Inherited permissions of one role (1h tier)
    RoleInherited(Uuid),
    /// Level-bucketed hierarchy tree view (1h tier)
    HierarchyTree,
}

impl CacheKey {
    pub fn render(&self) -> String {
        match self {
            CacheKey::UserPermissions(id) => format!("{ROOT}:user:{id}:permissions"),
            CacheKey::UserRoles(id) => format!("{ROOT}:user:{id}:roles"),
            CacheKey::RolePermissions(id) => format!("{ROOT}:role:{id}:permissions"),
            CacheKey::AllRoles => format!("{ROOT}:catalog:roles"),
            CacheKey::AllPermissions => format!("{ROOT}:catalog:permissions"),
            CacheKey::SystemRoles => format!("{ROOT}:catalog:system_roles"),
            CacheKey::UserEffective(id) => format!("{ROOT}:hierarchy:user:{id}:effective"),
            CacheKey::RoleInherited(id) => format!("{ROOT}:hierarchy:role:{id}:inherited"),
            CacheKey::HierarchyTree => format!("{ROOT}:hierarchy:tree"),
        }
    }
}

/// Prefix covering every key owned by this crate
pub fn root_prefix() -> String {
    format!("{ROOT}:")
}

/// Prefix covering the derived hierarchy entries (tree, inherited sets,
/// effective sets)
pub fn hierarchy_prefix() -> String {
    format!("{ROOT}:hierarchy:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            CacheKey::UserRoles(id).render(),
            "hub_access:user:550e8400-e29b-41d4-a716-446655440000:roles"
        );
        assert_eq!(CacheKey::AllRoles.render(), "hub_access:catalog:roles");
        assert_eq!(
            CacheKey::HierarchyTree.render(),
            "hub_access:hierarchy:tree"
        );
    }

    #[test]
    fn test_prefix_containment() {
        let id = Uuid::new_v4();
        assert!(CacheKey::RoleInherited(id)
            .render()
            .starts_with(&hierarchy_prefix()));
        assert!(CacheKey::UserEffective(id)
            .render()
            .starts_with(&hierarchy_prefix()));
        // catalog entries must not be swept by a hierarchy clear
        assert!(!CacheKey::RolePermissions(id)
            .render()
            .starts_with(&hierarchy_prefix()));
        assert!(CacheKey::RolePermissions(id)
            .render()
            .starts_with(&root_prefix()));
    }
}
