//! Read-through cache over role, permission, and user lookups
//!
//! Correctness never depends on a hit: every entry can be dropped at any
//! time and the next read recomputes from source. Only latency depends on
//! cache state, so backend failures degrade to source reads instead of
//! surfacing to callers.

use crate::cache::{self, keys, CacheKey, CacheStore};
use crate::config::CacheSettings;
use crate::domain::{Permission, Role};
use crate::error::Result;
use crate::repository::AccessRepository;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct RolePermissionCacheService<S: CacheStore, R: AccessRepository> {
    store: Arc<S>,
    repo: Arc<R>,
    ttl: Duration,
}

impl<S: CacheStore, R: AccessRepository> RolePermissionCacheService<S, R> {
    pub fn new(store: Arc<S>, repo: Arc<R>, settings: &CacheSettings) -> Self {
        Self {
            store,
            repo,
            ttl: settings.catalog_ttl(),
        }
    }

    // ==================== Lookups ====================

    /// Active roles of a user, level ascending (most privileged first).
    /// Unknown user resolves to an empty list.
    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let key = CacheKey::UserRoles(user_id);
        if let Some(roles) = cache::read_json(&*self.store, &key).await {
            return Ok(roles);
        }

        let roles = self.repo.list_active_roles_for_user(user_id).await?;
        cache::write_json(&*self.store, &key, &roles, self.ttl).await;
        Ok(roles)
    }

    /// Deduplicated union of direct permissions across the user's active
    /// roles. Inherited permissions are the hierarchy engine's concern.
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>> {
        let key = CacheKey::UserPermissions(user_id);
        if let Some(permissions) = cache::read_json(&*self.store, &key).await {
            return Ok(permissions);
        }

        let roles = self.get_user_roles(user_id).await?;
        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for role in &roles {
            for permission in self.get_role_permissions(role.id).await? {
                if seen.insert(permission.id) {
                    permissions.push(permission);
                }
            }
        }

        cache::write_json(&*self.store, &key, &permissions, self.ttl).await;
        Ok(permissions)
    }

    /// Active permissions of one role, presentation order
    pub async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        let key = CacheKey::RolePermissions(role_id);
        if let Some(permissions) = cache::read_json(&*self.store, &key).await {
            return Ok(permissions);
        }

        let permissions = self.repo.list_role_permissions(role_id).await?;
        cache::write_json(&*self.store, &key, &permissions, self.ttl).await;
        Ok(permissions)
    }

    pub async fn get_all_roles(&self) -> Result<Vec<Role>> {
        let key = CacheKey::AllRoles;
        if let Some(roles) = cache::read_json(&*self.store, &key).await {
            return Ok(roles);
        }

        let roles = self.repo.list_active_roles().await?;
        cache::write_json(&*self.store, &key, &roles, self.ttl).await;
        Ok(roles)
    }

    pub async fn get_all_permissions(&self) -> Result<Vec<Permission>> {
        let key = CacheKey::AllPermissions;
        if let Some(permissions) = cache::read_json(&*self.store, &key).await {
            return Ok(permissions);
        }

        let permissions = self.repo.list_active_permissions().await?;
        cache::write_json(&*self.store, &key, &permissions, self.ttl).await;
        Ok(permissions)
    }

    pub async fn get_system_roles(&self) -> Result<Vec<Role>> {
        let key = CacheKey::SystemRoles;
        if let Some(roles) = cache::read_json(&*self.store, &key).await {
            return Ok(roles);
        }

        let roles = self.repo.list_system_roles().await?;
        cache::write_json(&*self.store, &key, &roles, self.ttl).await;
        Ok(roles)
    }

    // ==================== Checks ====================

    /// Exact-name check first, then wildcard matching over the user's
    /// cached permission set
    pub async fn user_has_permission(&self, user_id: Uuid, permission_name: &str) -> Result<bool> {
        let permissions = self.get_user_permissions(user_id).await?;
        if permissions.iter().any(|p| p.name == permission_name) {
            return Ok(true);
        }
        Ok(permissions.iter().any(|p| p.matches(permission_name)))
    }

    /// Exact-name membership test over the user's cached role list
    pub async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        let roles = self.get_user_roles(user_id).await?;
        Ok(roles.iter().any(|r| r.name == role_name))
    }

    // ==================== Invalidation ====================

    /// Drop every cache entry scoped to one user, including the derived
    /// effective-permission set
    pub async fn clear_user_caches(&self, user_id: Uuid) {
        cache::forget_key(&*self.store, &CacheKey::UserPermissions(user_id)).await;
        cache::forget_key(&*self.store, &CacheKey::UserRoles(user_id)).await;
        cache::forget_key(&*self.store, &CacheKey::UserEffective(user_id)).await;
    }

    /// Drop one role's entries plus, by fan-out over the assignment table,
    /// every user currently holding it. The tree view composes from role
    /// data, so it goes too.
    pub async fn clear_role_caches(&self, role_id: Uuid) -> Result<()> {
        cache::forget_key(&*self.store, &CacheKey::RolePermissions(role_id)).await;
        cache::forget_key(&*self.store, &CacheKey::RoleInherited(role_id)).await;
        cache::forget_key(&*self.store, &CacheKey::AllRoles).await;
        cache::forget_key(&*self.store, &CacheKey::SystemRoles).await;
        cache::forget_key(&*self.store, &CacheKey::HierarchyTree).await;

        let user_ids = self.repo.list_active_user_ids_for_role(role_id).await?;
        for user_id in user_ids {
            self.clear_user_caches(user_id).await;
        }
        Ok(())
    }

    /// Fan out to every role holding the permission, and from each role to
    /// its users
    pub async fn clear_permission_caches(&self, permission_id: Uuid) -> Result<()> {
        cache::forget_key(&*self.store, &CacheKey::AllPermissions).await;

        let role_ids = self.repo.list_role_ids_with_permission(permission_id).await?;
        for role_id in role_ids {
            self.clear_role_caches(role_id).await?;
        }
        Ok(())
    }

    /// Wipe everything under the crate's key prefix. Failure is logged and
    /// swallowed: remaining entries age out by TTL.
    pub async fn clear_all_caches(&self) {
        match self.store.forget_prefix(&keys::root_prefix()).await {
            Ok(removed) => tracing::debug!(removed, "cleared all access caches"),
            Err(e) => {
                tracing::warn!(error = %e, "bulk cache clear failed; entries will expire by TTL")
            }
        }
    }

    // ==================== Warm-up ====================

    /// Pre-populate global catalogs and per-user entries for the most
    /// recently active users. An optimization only; per-user failures are
    /// logged and skipped.
    pub async fn warm_up_caches(&self, limit: i64) -> Result<u64> {
        self.get_all_roles().await?;
        self.get_all_permissions().await?;
        self.get_system_roles().await?;

        let users = self.repo.list_recently_active_users(None, limit).await?;
        let mut warmed = 0u64;
        for user in &users {
            let primed = async {
                self.get_user_roles(user.id).await?;
                self.get_user_permissions(user.id).await?;
                Ok::<_, crate::error::AccessError>(())
            }
            .await;

            match primed {
                Ok(()) => warmed += 1,
                Err(e) => tracing::error!(user_id = %user.id, error = %e, "cache warm-up failed for user"),
            }
        }

        tracing::debug!(warmed, "cache warm-up complete");
        Ok(warmed)
    }
}
