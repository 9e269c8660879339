//! Administrative mutations over roles, permissions, and assignments
//!
//! The only layer that raises `NotFound`/`InvalidTarget`/`Conflict`; the
//! read path resolves absence to empty results. Every mutation triggers
//! the matching cache invalidation, and invalidation failure never aborts
//! a mutation that already succeeded; the TTL is the consistency backstop.

use crate::cache::CacheStore;
use crate::domain::{
    AssignRolesInput, CreatePermissionInput, CreateRoleInput, Permission, Role, UpdateRoleInput,
};
use crate::error::{AccessError, Result};
use crate::repository::AccessRepository;
use crate::service::{RoleHierarchyService, RolePermissionCacheService};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AccessAdminService<S: CacheStore, R: AccessRepository> {
    repo: Arc<R>,
    cache: Arc<RolePermissionCacheService<S, R>>,
    hierarchy: Arc<RoleHierarchyService<S, R>>,
}

impl<S: CacheStore, R: AccessRepository> AccessAdminService<S, R> {
    pub fn new(
        repo: Arc<R>,
        cache: Arc<RolePermissionCacheService<S, R>>,
        hierarchy: Arc<RoleHierarchyService<S, R>>,
    ) -> Self {
        Self {
            repo,
            cache,
            hierarchy,
        }
    }

    // ==================== Roles ====================

    pub async fn create_role(&self, input: CreateRoleInput) -> Result<Role> {
        input.validate()?;

        if self.repo.find_role_by_name(&input.name).await?.is_some() {
            return Err(AccessError::Conflict(format!(
                "Role '{}' already exists",
                input.name
            )));
        }

        let role = self.repo.create_role(&input).await?;
        self.invalidate_role(role.id).await;
        Ok(role)
    }

    pub async fn update_role(&self, id: Uuid, input: UpdateRoleInput) -> Result<Role> {
        input.validate()?;

        let existing = self
            .repo
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("Role {id} not found")))?;

        if existing.is_system_role {
            if let Some(name) = &input.name {
                if *name != existing.name {
                    return Err(AccessError::InvalidTarget(
                        "System roles cannot be renamed".to_string(),
                    ));
                }
            }
        }

        let role = self.repo.update_role(id, &input).await?;
        self.invalidate_role(id).await;
        Ok(role)
    }

    pub async fn delete_role(&self, id: Uuid) -> Result<()> {
        let existing = self
            .repo
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("Role {id} not found")))?;

        if existing.is_system_role {
            return Err(AccessError::InvalidTarget(
                "System roles cannot be deleted".to_string(),
            ));
        }

        // fan-out needs the assignment rows, so clear before the delete
        // soft-expires them
        self.invalidate_role(id).await;
        self.repo.delete_role(id).await?;
        Ok(())
    }

    // ==================== Permissions ====================

    pub async fn create_permission(&self, input: CreatePermissionInput) -> Result<Permission> {
        input.validate()?;

        if self
            .repo
            .find_permission_by_name(&input.name)
            .await?
            .is_some()
        {
            return Err(AccessError::Conflict(format!(
                "Permission '{}' already exists",
                input.name
            )));
        }

        let permission = self.repo.create_permission(&input).await?;
        self.invalidate_permission(permission.id).await;
        Ok(permission)
    }

    pub async fn delete_permission(&self, id: Uuid) -> Result<()> {
        let _ = self
            .repo
            .find_permission_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("Permission {id} not found")))?;

        // fan-out walks role_permissions, so clear before those rows go
        self.invalidate_permission(id).await;
        self.repo.delete_permission(id).await?;
        Ok(())
    }

    pub async fn assign_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<()> {
        let _ = self
            .repo
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("Role {role_id} not found")))?;
        let _ = self
            .repo
            .find_permission_by_id(permission_id)
            .await?
            .ok_or_else(|| {
                AccessError::NotFound(format!("Permission {permission_id} not found"))
            })?;

        self.repo
            .assign_permission_to_role(role_id, permission_id)
            .await?;
        self.invalidate_role(role_id).await;
        Ok(())
    }

    pub async fn remove_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<()> {
        self.repo
            .remove_permission_from_role(role_id, permission_id)
            .await?;
        self.invalidate_role(role_id).await;
        Ok(())
    }

    // ==================== Assignments ====================

    pub async fn assign_roles_to_user(&self, input: AssignRolesInput) -> Result<()> {
        input.validate()?;

        for role_id in &input.role_ids {
            if self.repo.find_role_by_id(*role_id).await?.is_none() {
                return Err(AccessError::NotFound(format!("Role {role_id} not found")));
            }
        }

        self.repo.assign_roles_to_user(&input).await?;
        self.cache.clear_user_caches(input.user_id).await;
        Ok(())
    }

    pub async fn revoke_role_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        self.repo.deactivate_user_role(user_id, role_id).await?;
        self.cache.clear_user_caches(user_id).await;
        Ok(())
    }

    // ==================== Invalidation ====================

    async fn invalidate_role(&self, role_id: Uuid) {
        if let Err(e) = self.cache.clear_role_caches(role_id).await {
            tracing::warn!(role_id = %role_id, error = %e, "role cache invalidation incomplete");
        }
        self.hierarchy.clear_hierarchy_caches().await;
    }

    async fn invalidate_permission(&self, permission_id: Uuid) {
        if let Err(e) = self.cache.clear_permission_caches(permission_id).await {
            tracing::warn!(permission_id = %permission_id, error = %e, "permission cache invalidation incomplete");
        }
        self.hierarchy.clear_hierarchy_caches().await;
    }
}
