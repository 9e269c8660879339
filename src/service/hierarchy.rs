//! Role hierarchy resolution
//!
//! Computes effective permission sets by combining a role's direct
//! permissions with permissions inherited from more-privileged roles.
//! Inheritance is a computed relation, not a stored edge: it is decided
//! per role pair by [`should_inherit_from`]. Permissions are additive;
//! there is no deny/override mechanism at this layer.
//!
//! Derived results are cached with a shorter TTL than the raw catalogs
//! because they recompose whenever any role changes.

use crate::cache::{self, keys, CacheKey, CacheStore};
use crate::config::CacheSettings;
use crate::domain::{
    HierarchyIssue, IssueKind, Permission, Role, RoleHierarchyTree, RoleNode, RoleSummary, User,
};
use crate::error::Result;
use crate::repository::AccessRepository;
use crate::service::RolePermissionCacheService;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Role that inherits from every other active role
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// Largest privilege-level gap the fallback rule bridges
const MAX_INHERIT_LEVEL_GAP: i32 = 2;

/// Decide whether `child` inherits permissions from `parent`.
///
/// `super_admin` inherits from every other role unconditionally. For all
/// other roles the parent must be strictly more privileged (lower level);
/// the level ordering is authoritative and the named rules act as a
/// secondary filter within it. One of the following must then hold:
/// - `child` name contains "admin" and `parent` is named exactly "user",
/// - `child` name contains "manager" and `parent` name contains "employee",
/// - the level gap is at most [`MAX_INHERIT_LEVEL_GAP`].
pub fn should_inherit_from(child: &Role, parent: &Role) -> bool {
    if child.id == parent.id {
        return false;
    }
    if child.name == SUPER_ADMIN_ROLE {
        return true;
    }
    if parent.level >= child.level {
        return false;
    }
    if child.name.contains("admin") && parent.name == "user" {
        return true;
    }
    if child.name.contains("manager") && parent.name.contains("employee") {
        return true;
    }
    child.level - parent.level <= MAX_INHERIT_LEVEL_GAP
}

pub struct RoleHierarchyService<S: CacheStore, R: AccessRepository> {
    store: Arc<S>,
    repo: Arc<R>,
    cache: Arc<RolePermissionCacheService<S, R>>,
    ttl: Duration,
    warmup_user_limit: i64,
    rebuild_active_days: i64,
}

impl<S: CacheStore, R: AccessRepository> RoleHierarchyService<S, R> {
    pub fn new(
        store: Arc<S>,
        repo: Arc<R>,
        cache: Arc<RolePermissionCacheService<S, R>>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            store,
            repo,
            cache,
            ttl: settings.hierarchy_ttl(),
            warmup_user_limit: settings.warmup_user_limit,
            rebuild_active_days: settings.rebuild_active_days,
        }
    }

    // ==================== Resolution ====================

    /// Roles `role` may inherit from. The level ordering restricts
    /// candidates to strictly more-privileged roles; `super_admin` is the
    /// one role whose rule spans the whole catalog.
    async fn inheritance_candidates(&self, role: &Role) -> Result<Vec<Role>> {
        if role.name == SUPER_ADMIN_ROLE {
            let roles = self.repo.list_active_roles().await?;
            Ok(roles.into_iter().filter(|r| r.id != role.id).collect())
        } else {
            self.repo.list_roles_below_level(role.level).await
        }
    }

    /// Ancestors `role` directly inherits from, most privileged first
    pub async fn get_inheritance_chain(&self, role: &Role) -> Result<Vec<Role>> {
        let candidates = self.inheritance_candidates(role).await?;
        Ok(candidates
            .into_iter()
            .filter(|parent| should_inherit_from(role, parent))
            .collect())
    }

    /// Permissions `role` receives from its ancestors, deduplicated by
    /// permission identity
    pub async fn get_inherited_permissions(&self, role: &Role) -> Result<Vec<Permission>> {
        let key = CacheKey::RoleInherited(role.id);
        if let Some(permissions) = cache::read_json(&*self.store, &key).await {
            return Ok(permissions);
        }

        let mut seen = HashSet::new();
        let mut inherited = Vec::new();
        for parent in self.get_inheritance_chain(role).await? {
            for permission in self.cache.get_role_permissions(parent.id).await? {
                if seen.insert(permission.id) {
                    inherited.push(permission);
                }
            }
        }

        cache::write_json(&*self.store, &key, &inherited, self.ttl).await;
        Ok(inherited)
    }

    /// Full permission set of a user: direct permissions of every active
    /// role plus each role's inherited permissions, deduplicated by
    /// identity. Unknown user resolves to an empty set.
    pub async fn get_user_effective_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>> {
        let key = CacheKey::UserEffective(user_id);
        if let Some(permissions) = cache::read_json(&*self.store, &key).await {
            return Ok(permissions);
        }

        let roles = self.cache.get_user_roles(user_id).await?;
        let mut seen = HashSet::new();
        let mut effective = Vec::new();
        for role in &roles {
            for permission in self.cache.get_role_permissions(role.id).await? {
                if seen.insert(permission.id) {
                    effective.push(permission);
                }
            }
            for permission in self.get_inherited_permissions(role).await? {
                if seen.insert(permission.id) {
                    effective.push(permission);
                }
            }
        }

        cache::write_json(&*self.store, &key, &effective, self.ttl).await;
        Ok(effective)
    }

    // ==================== Access queries ====================

    /// Check `"{resource}.{action}"` against the user's permissions: the
    /// direct cached check first (cheap path), then the full effective set
    /// with wildcard matching
    pub async fn can_access_resource(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> Result<bool> {
        let permission_name = format!("{resource}.{action}");

        if self
            .cache
            .user_has_permission(user_id, &permission_name)
            .await?
        {
            return Ok(true);
        }

        let effective = self.get_user_effective_permissions(user_id).await?;
        Ok(effective
            .iter()
            .any(|p| p.name == permission_name || p.matches(&permission_name)))
    }

    /// Inverse query: every active user whose roles hold or inherit
    /// `"{resource}.{action}"`. Re-runs inheritance per role, so worst
    /// case is quadratic in the role count; catalogs are small.
    pub async fn get_users_with_resource_access(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<Vec<User>> {
        let permission_name = format!("{resource}.{action}");
        let Some(permission) = self.repo.find_permission_by_name(&permission_name).await? else {
            return Ok(Vec::new());
        };

        let mut role_ids: HashSet<Uuid> = self
            .repo
            .list_role_ids_with_permission(permission.id)
            .await?
            .into_iter()
            .collect();

        for role in self.repo.list_active_roles().await? {
            if role_ids.contains(&role.id) {
                continue;
            }
            let inherited = self.get_inherited_permissions(&role).await?;
            if inherited.iter().any(|p| p.id == permission.id) {
                role_ids.insert(role.id);
            }
        }

        let role_ids: Vec<Uuid> = role_ids.into_iter().collect();
        self.repo.list_active_users_for_roles(&role_ids).await
    }

    // ==================== Introspection ====================

    /// Level-bucketed tree of active roles with permission/user counts and
    /// inheritance provenance, for administrative visualization
    pub async fn get_role_hierarchy_tree(&self) -> Result<RoleHierarchyTree> {
        let key = CacheKey::HierarchyTree;
        if let Some(tree) = cache::read_json(&*self.store, &key).await {
            return Ok(tree);
        }

        let roles = self.repo.list_active_roles().await?;
        let mut tree = RoleHierarchyTree::default();
        for role in &roles {
            let permissions = self.cache.get_role_permissions(role.id).await?;
            let user_count = self.repo.count_active_users_for_role(role.id).await? as usize;
            let inherits_from = self
                .get_inheritance_chain(role)
                .await?
                .iter()
                .map(RoleSummary::from)
                .collect();

            tree.levels.entry(role.level).or_default().push(RoleNode {
                role: RoleSummary::from(role),
                display_name: role.display_name.clone(),
                permission_count: permissions.len(),
                user_count,
                inherits_from,
            });
        }

        cache::write_json(&*self.store, &key, &tree, self.ttl).await;
        Ok(tree)
    }

    /// Diagnostic sweep over every active role: cycle detection plus the
    /// level-ordering check on each inheritance chain. Returns a report;
    /// never blocks resolution.
    pub async fn validate_hierarchy(&self) -> Result<Vec<HierarchyIssue>> {
        let roles = self.repo.list_active_roles().await?;
        let mut issues = Vec::new();

        for role in &roles {
            if Self::has_circular_inheritance(role, &roles) {
                issues.push(HierarchyIssue {
                    kind: IssueKind::CircularInheritance,
                    role: RoleSummary::from(role),
                    detail: format!(
                        "inheritance walk starting at '{}' revisits the role",
                        role.name
                    ),
                });
            }

            for ancestor in roles.iter().filter(|p| should_inherit_from(role, p)) {
                if ancestor.level >= role.level {
                    issues.push(HierarchyIssue {
                        kind: IssueKind::LevelInconsistency,
                        role: RoleSummary::from(role),
                        detail: format!(
                            "inherits from '{}' (level {}) which is not more privileged than level {}",
                            ancestor.name, ancestor.level, role.level
                        ),
                    });
                }
            }
        }

        Ok(issues)
    }

    /// Visited-set guarded walk over the inheritance relation. A cycle
    /// degrades to "stop revisiting" rather than unbounded recursion, and
    /// is reported when the walk can reach the starting role again.
    fn has_circular_inheritance(role: &Role, roles: &[Role]) -> bool {
        let mut visited = HashSet::new();
        visited.insert(role.id);
        let mut stack = vec![role];

        while let Some(current) = stack.pop() {
            for parent in roles.iter().filter(|p| should_inherit_from(current, p)) {
                if parent.id == role.id {
                    return true;
                }
                if visited.insert(parent.id) {
                    stack.push(parent);
                }
            }
        }
        false
    }

    // ==================== Cache lifecycle ====================

    /// Drop the derived hierarchy entries: tree, inherited sets, effective
    /// sets. Failure is logged and swallowed; entries age out by TTL.
    pub async fn clear_hierarchy_caches(&self) {
        match self.store.forget_prefix(&keys::hierarchy_prefix()).await {
            Ok(removed) => tracing::debug!(removed, "cleared hierarchy caches"),
            Err(e) => {
                tracing::warn!(error = %e, "hierarchy cache clear failed; entries will expire by TTL")
            }
        }
    }

    /// Clear, then re-prime: the tree, every active role's inherited set,
    /// and effective permissions for recently active users (bounded).
    /// Per-item failures are logged and skipped.
    pub async fn rebuild_hierarchy_caches(&self) -> Result<u64> {
        self.clear_hierarchy_caches().await;

        let mut primed = 0u64;

        match self.get_role_hierarchy_tree().await {
            Ok(_) => primed += 1,
            Err(e) => tracing::error!(error = %e, "failed to rebuild hierarchy tree"),
        }

        let roles = self.repo.list_active_roles().await?;
        for role in &roles {
            match self.get_inherited_permissions(role).await {
                Ok(_) => primed += 1,
                Err(e) => {
                    tracing::error!(role = %role.name, error = %e, "failed to rebuild inherited permissions")
                }
            }
        }

        let users = self
            .repo
            .list_recently_active_users(Some(self.rebuild_active_days), self.warmup_user_limit)
            .await?;
        for user in &users {
            match self.get_user_effective_permissions(user.id).await {
                Ok(_) => primed += 1,
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "failed to rebuild effective permissions")
                }
            }
        }

        tracing::debug!(primed, "hierarchy cache rebuild complete");
        Ok(primed)
    }
}
