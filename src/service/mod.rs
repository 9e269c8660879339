//! Business logic layer

pub mod access_admin;
pub mod hierarchy;
pub mod role_permission_cache;

pub use access_admin::AccessAdminService;
pub use hierarchy::{should_inherit_from, RoleHierarchyService, SUPER_ADMIN_ROLE};
pub use role_permission_cache::RolePermissionCacheService;
