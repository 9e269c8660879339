//! Role, permission, user, and assignment domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Activation status shared by roles, permissions, and users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Inactive,
}

impl EntityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityStatus::Active)
    }
}

/// Role entity
///
/// `level` is the privilege rank: a lower value means a more privileged
/// role. Inheritance direction is decided by comparing levels only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    /// Stable slug referenced by the inheritance rules (e.g. "content_manager")
    pub name: String,
    pub display_name: String,
    pub level: i32,
    pub status: EntityStatus,
    /// System roles cannot be renamed or deleted
    pub is_system_role: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Role {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            display_name: String::new(),
            level: 0,
            status: EntityStatus::Active,
            is_system_role: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Permission entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Uuid,
    /// Dot-namespaced name (e.g. "content.read"); non-leading segments may
    /// be the wildcard `*`
    pub name: String,
    pub display_name: String,
    /// Presentation grouping only; no effect on matching
    pub module: String,
    pub group: Option<String>,
    pub sort_order: i32,
    pub status: EntityStatus,
}

impl Default for Permission {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            display_name: String::new(),
            module: String::new(),
            group: None,
            sort_order: 0,
            status: EntityStatus::Active,
        }
    }
}

impl Permission {
    /// Whether this permission satisfies a check for `requested`.
    ///
    /// Exact comparison first. A name containing `*` is translated into an
    /// anchored case-insensitive regex: literal characters escaped,
    /// each `*` becomes `.*`, so "content.*" satisfies "content.read".
    pub fn matches(&self, requested: &str) -> bool {
        if self.name.eq_ignore_ascii_case(requested) {
            return true;
        }
        if !self.name.contains('*') {
            return false;
        }
        let translated = regex::escape(&self.name).replace(r"\*", ".*");
        match regex::RegexBuilder::new(&format!("^{translated}$"))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re.is_match(requested),
            Err(_) => false,
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub status: EntityStatus,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            display_name: None,
            status: EntityStatus::Active,
            last_active_at: None,
        }
    }
}

/// User-role assignment record
///
/// Assignments are soft-expired (`is_active = false`) on revocation, never
/// hard-deleted, so grant history stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Input for creating a role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    #[validate(length(min = 1, max = 100), custom(function = "validate_role_name"))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    pub level: i32,
    #[serde(default)]
    pub is_system_role: bool,
}

/// Input for updating a role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(min = 1, max = 100), custom(function = "validate_role_name"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
    pub level: Option<i32>,
    pub status: Option<EntityStatus>,
}

/// Input for creating a permission
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionInput {
    #[validate(
        length(min = 1, max = 150),
        custom(function = "validate_permission_name")
    )]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(length(min = 1, max = 100))]
    pub module: String,
    pub group: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Input for granting roles to a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRolesInput {
    pub user_id: Uuid,
    #[validate(length(min = 1))]
    pub role_ids: Vec<Uuid>,
}

/// Validate role slug format (e.g. "content_manager")
fn validate_role_name(name: &str) -> Result<(), validator::ValidationError> {
    if ROLE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_role_name"))
    }
}

/// Validate permission name format (e.g. "content.read", "content.*")
fn validate_permission_name(name: &str) -> Result<(), validator::ValidationError> {
    if PERMISSION_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_permission_name"))
    }
}

lazy_static::lazy_static! {
    /// Lowercase slug: letters, digits, underscores
    pub static ref ROLE_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9_]*$").unwrap();

    /// Dot-namespaced permission name; the leading segment is literal,
    /// later segments may be the wildcard `*`
    pub static ref PERMISSION_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9_]*(?:\.(?:[a-z][a-z0-9_]*|\*))*$").unwrap();
}
