//! Role, permission, and assignment repository

use crate::domain::{
    AssignRolesInput, CreatePermissionInput, CreateRoleInput, Permission, Role, UpdateRoleInput,
    User,
};
use crate::error::{AccessError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessRepository: Send + Sync {
    // Roles
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role>;
    async fn update_role(&self, id: Uuid, input: &UpdateRoleInput) -> Result<Role>;
    async fn delete_role(&self, id: Uuid) -> Result<()>;
    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    /// Active roles ordered by level ascending (most privileged first)
    async fn list_active_roles(&self) -> Result<Vec<Role>>;
    /// Active roles strictly more privileged than `level`, level ascending
    async fn list_roles_below_level(&self, level: i32) -> Result<Vec<Role>>;
    async fn list_system_roles(&self) -> Result<Vec<Role>>;

    // Permissions
    async fn create_permission(&self, input: &CreatePermissionInput) -> Result<Permission>;
    async fn delete_permission(&self, id: Uuid) -> Result<()>;
    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>>;
    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;
    async fn list_active_permissions(&self) -> Result<Vec<Permission>>;
    /// Active permissions of one role, presentation order
    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>>;

    // Role-permission mapping
    async fn assign_permission_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;
    async fn remove_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;
    async fn list_role_ids_with_permission(&self, permission_id: Uuid) -> Result<Vec<Uuid>>;

    // Users and assignments
    /// Active roles of an active assignment, level ascending
    async fn list_active_roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>>;
    async fn list_active_user_ids_for_role(&self, role_id: Uuid) -> Result<Vec<Uuid>>;
    async fn count_active_users_for_role(&self, role_id: Uuid) -> Result<u64>;
    async fn list_active_users_for_roles(&self, role_ids: &[Uuid]) -> Result<Vec<User>>;
    /// Active users ordered by recency; `within_days` of `None` applies no
    /// recency filter
    async fn list_recently_active_users(
        &self,
        within_days: Option<i64>,
        limit: i64,
    ) -> Result<Vec<User>>;
    async fn assign_roles_to_user(&self, input: &AssignRolesInput) -> Result<()>;
    /// Soft-expire one assignment (`is_active = false`); the record stays
    /// for audit history
    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;
}

const ROLE_COLUMNS: &str =
    "id, name, display_name, level, status, is_system_role, created_at, updated_at";

const PERMISSION_COLUMNS: &str =
    "id, name, display_name, module, `group`, sort_order, status";

pub struct AccessRepositoryImpl {
    pool: MySqlPool,
}

impl AccessRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessRepository for AccessRepositoryImpl {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, display_name, level, status, is_system_role, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'active', ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.display_name)
        .bind(input.level)
        .bind(input.is_system_role)
        .execute(&self.pool)
        .await?;

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AccessError::Internal(anyhow::anyhow!("Failed to create role")))
    }

    async fn update_role(&self, id: Uuid, input: &UpdateRoleInput) -> Result<Role> {
        let existing = self
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("Role {id} not found")))?;

        let name = input.name.as_ref().unwrap_or(&existing.name);
        let display_name = input.display_name.as_ref().unwrap_or(&existing.display_name);
        let level = input.level.unwrap_or(existing.level);
        let status = input.status.unwrap_or(existing.status);

        sqlx::query(
            r#"
            UPDATE roles
            SET name = ?, display_name = ?, level = ?, status = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(display_name)
        .bind(level)
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AccessError::Internal(anyhow::anyhow!("Failed to update role")))
    }

    async fn delete_role(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        // assignments are soft-expired, not deleted: grant history stays
        sqlx::query("UPDATE user_roles SET is_active = 0 WHERE role_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(format!("Role {id} not found")));
        }

        Ok(())
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn list_active_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE status = 'active' ORDER BY level ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn list_roles_below_level(&self, level: i32) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles \
             WHERE status = 'active' AND level < ? ORDER BY level ASC, name ASC"
        ))
        .bind(level)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn list_system_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles \
             WHERE status = 'active' AND is_system_role = 1 ORDER BY level ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn create_permission(&self, input: &CreatePermissionInput) -> Result<Permission> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO permissions (id, name, display_name, module, `group`, sort_order, status)
            VALUES (?, ?, ?, ?, ?, ?, 'active')
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.display_name)
        .bind(&input.module)
        .bind(&input.group)
        .bind(input.sort_order)
        .execute(&self.pool)
        .await?;

        self.find_permission_by_id(id)
            .await?
            .ok_or_else(|| AccessError::Internal(anyhow::anyhow!("Failed to create permission")))
    }

    async fn delete_permission(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(format!("Permission {id} not found")));
        }

        Ok(())
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn list_active_permissions(&self) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions \
             WHERE status = 'active' ORDER BY module ASC, `group` ASC, sort_order ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.display_name, p.module, p.`group`, p.sort_order, p.status
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = ? AND p.status = 'active'
            ORDER BY p.module ASC, p.`group` ASC, p.sort_order ASC
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn assign_permission_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        sqlx::query("INSERT IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_role_ids_with_permission(&self, permission_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT role_id FROM role_permissions WHERE permission_id = ?")
                .bind(permission_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn list_active_roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.display_name, r.level, r.status, r.is_system_role,
                   r.created_at, r.updated_at
            FROM roles r
            INNER JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = ? AND ur.is_active = 1 AND r.status = 'active'
            ORDER BY r.level ASC, r.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn list_active_user_ids_for_role(&self, role_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT ur.user_id
            FROM user_roles ur
            INNER JOIN users u ON u.id = ur.user_id
            WHERE ur.role_id = ? AND ur.is_active = 1 AND u.status = 'active'
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn count_active_users_for_role(&self, role_id: Uuid) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_roles ur
            INNER JOIN users u ON u.id = ur.user_id
            WHERE ur.role_id = ? AND ur.is_active = 1 AND u.status = 'active'
            "#,
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn list_active_users_for_roles(&self, role_ids: &[Uuid]) -> Result<Vec<User>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; role_ids.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT u.id, u.email, u.display_name, u.status, u.last_active_at \
             FROM users u \
             INNER JOIN user_roles ur ON ur.user_id = u.id \
             WHERE u.status = 'active' AND ur.is_active = 1 AND ur.role_id IN ({placeholders}) \
             ORDER BY u.email ASC"
        );

        let mut query = sqlx::query_as::<_, User>(&sql);
        for role_id in role_ids {
            query = query.bind(role_id);
        }

        let users = query.fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn list_recently_active_users(
        &self,
        within_days: Option<i64>,
        limit: i64,
    ) -> Result<Vec<User>> {
        let mut sql = String::from(
            "SELECT id, email, display_name, status, last_active_at \
             FROM users WHERE status = 'active' AND last_active_at IS NOT NULL",
        );

        if within_days.is_some() {
            sql.push_str(" AND last_active_at >= NOW() - INTERVAL ? DAY");
        }
        sql.push_str(" ORDER BY last_active_at DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, User>(&sql);
        if let Some(days) = within_days {
            query = query.bind(days);
        }
        query = query.bind(limit);

        let users = query.fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn assign_roles_to_user(&self, input: &AssignRolesInput) -> Result<()> {
        for role_id in &input.role_ids {
            // re-granting a soft-expired assignment reactivates it
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id, is_active, assigned_at)
                VALUES (?, ?, 1, NOW())
                ON DUPLICATE KEY UPDATE is_active = 1, assigned_at = NOW()
                "#,
            )
            .bind(input.user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE user_roles SET is_active = 0 WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
