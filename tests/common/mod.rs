//! Common test utilities
//!
//! An instrumented in-memory repository plus a wired-up service stack over
//! the in-memory cache store. The read counters let tests assert whether a
//! lookup was served from cache or recomputed from source.

// not every test binary touches every helper
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use hub_access_core::cache::MemoryCacheStore;
use hub_access_core::config::CacheSettings;
use hub_access_core::domain::{
    AssignRolesInput, CreatePermissionInput, CreateRoleInput, Permission, Role, UpdateRoleInput,
    User, UserRoleAssignment,
};
use hub_access_core::error::{AccessError, Result};
use hub_access_core::repository::AccessRepository;
use hub_access_core::service::{
    AccessAdminService, RoleHierarchyService, RolePermissionCacheService,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use uuid::Uuid;

/// Load .env and install the test log subscriber once per binary
static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = dotenvy::dotenv();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

#[derive(Default)]
struct State {
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    users: HashMap<Uuid, User>,
    assignments: Vec<UserRoleAssignment>,
}

/// In-memory [`AccessRepository`] with per-query read counters
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
    /// Source reads of per-role permission lists
    pub role_permission_reads: AtomicUsize,
    /// Source reads of per-user role lists
    pub user_role_reads: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== Seeding helpers ====================

    pub fn add_role(&self, name: &str, level: i32) -> Role {
        let role = Role {
            name: name.to_string(),
            display_name: name.to_string(),
            level,
            ..Default::default()
        };
        self.lock().roles.insert(role.id, role.clone());
        role
    }

    pub fn add_system_role(&self, name: &str, level: i32) -> Role {
        let role = Role {
            name: name.to_string(),
            display_name: name.to_string(),
            level,
            is_system_role: true,
            ..Default::default()
        };
        self.lock().roles.insert(role.id, role.clone());
        role
    }

    pub fn add_permission(&self, name: &str) -> Permission {
        let permission = Permission {
            name: name.to_string(),
            display_name: name.to_string(),
            module: name.split('.').next().unwrap_or_default().to_string(),
            ..Default::default()
        };
        self.lock()
            .permissions
            .insert(permission.id, permission.clone());
        permission
    }

    pub fn add_user(&self, email: &str) -> User {
        let user = User {
            email: email.to_string(),
            last_active_at: Some(Utc::now()),
            ..Default::default()
        };
        self.lock().users.insert(user.id, user.clone());
        user
    }

    pub fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) {
        self.lock().role_permissions.insert((role_id, permission_id));
    }

    pub fn assign_role(&self, user_id: Uuid, role_id: Uuid) {
        self.lock().assignments.push(UserRoleAssignment {
            user_id,
            role_id,
            is_active: true,
            assigned_at: Utc::now(),
        });
    }

    fn sorted_roles(mut roles: Vec<Role>) -> Vec<Role> {
        roles.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        roles
    }

    fn sorted_permissions(mut permissions: Vec<Permission>) -> Vec<Permission> {
        permissions.sort_by(|a, b| {
            a.module
                .cmp(&b.module)
                .then_with(|| a.group.cmp(&b.group))
                .then_with(|| a.sort_order.cmp(&b.sort_order))
                .then_with(|| a.name.cmp(&b.name))
        });
        permissions
    }
}

#[async_trait]
impl AccessRepository for InMemoryRepository {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role> {
        let role = Role {
            name: input.name.clone(),
            display_name: input.display_name.clone(),
            level: input.level,
            is_system_role: input.is_system_role,
            ..Default::default()
        };
        self.lock().roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, input: &UpdateRoleInput) -> Result<Role> {
        let mut state = self.lock();
        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| AccessError::NotFound(format!("Role {id} not found")))?;

        if let Some(name) = &input.name {
            role.name = name.clone();
        }
        if let Some(display_name) = &input.display_name {
            role.display_name = display_name.clone();
        }
        if let Some(level) = input.level {
            role.level = level;
        }
        if let Some(status) = input.status {
            role.status = status;
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: Uuid) -> Result<()> {
        let mut state = self.lock();
        if state.roles.remove(&id).is_none() {
            return Err(AccessError::NotFound(format!("Role {id} not found")));
        }
        state.role_permissions.retain(|(role_id, _)| *role_id != id);
        for assignment in state
            .assignments
            .iter_mut()
            .filter(|a| a.role_id == id)
        {
            assignment.is_active = false;
        }
        Ok(())
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.lock().roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.lock().roles.values().find(|r| r.name == name).cloned())
    }

    async fn list_active_roles(&self) -> Result<Vec<Role>> {
        let roles = self
            .lock()
            .roles
            .values()
            .filter(|r| r.status.is_active())
            .cloned()
            .collect();
        Ok(Self::sorted_roles(roles))
    }

    async fn list_roles_below_level(&self, level: i32) -> Result<Vec<Role>> {
        let roles = self
            .lock()
            .roles
            .values()
            .filter(|r| r.status.is_active() && r.level < level)
            .cloned()
            .collect();
        Ok(Self::sorted_roles(roles))
    }

    async fn list_system_roles(&self) -> Result<Vec<Role>> {
        let roles = self
            .lock()
            .roles
            .values()
            .filter(|r| r.status.is_active() && r.is_system_role)
            .cloned()
            .collect();
        Ok(Self::sorted_roles(roles))
    }

    async fn create_permission(&self, input: &CreatePermissionInput) -> Result<Permission> {
        let permission = Permission {
            name: input.name.clone(),
            display_name: input.display_name.clone(),
            module: input.module.clone(),
            group: input.group.clone(),
            sort_order: input.sort_order,
            ..Default::default()
        };
        self.lock()
            .permissions
            .insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, id: Uuid) -> Result<()> {
        let mut state = self.lock();
        if state.permissions.remove(&id).is_none() {
            return Err(AccessError::NotFound(format!("Permission {id} not found")));
        }
        state
            .role_permissions
            .retain(|(_, permission_id)| *permission_id != id);
        Ok(())
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self.lock().permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        Ok(self
            .lock()
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_active_permissions(&self) -> Result<Vec<Permission>> {
        let permissions = self
            .lock()
            .permissions
            .values()
            .filter(|p| p.status.is_active())
            .cloned()
            .collect();
        Ok(Self::sorted_permissions(permissions))
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>> {
        self.role_permission_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        let permissions = state
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p))
            .filter(|p| p.status.is_active())
            .cloned()
            .collect();
        Ok(Self::sorted_permissions(permissions))
    }

    async fn assign_permission_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        self.lock().role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn remove_permission_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        self.lock()
            .role_permissions
            .remove(&(role_id, permission_id));
        Ok(())
    }

    async fn list_role_ids_with_permission(&self, permission_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .lock()
            .role_permissions
            .iter()
            .filter(|(_, p)| *p == permission_id)
            .map(|(r, _)| *r)
            .collect())
    }

    async fn list_active_roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        self.user_role_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        let roles = state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.is_active)
            .filter_map(|a| state.roles.get(&a.role_id))
            .filter(|r| r.status.is_active())
            .cloned()
            .collect();
        Ok(Self::sorted_roles(roles))
    }

    async fn list_active_user_ids_for_role(&self, role_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.lock();
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.role_id == role_id && a.is_active)
            .filter(|a| {
                state
                    .users
                    .get(&a.user_id)
                    .is_some_and(|u| u.status.is_active())
            })
            .map(|a| a.user_id)
            .collect())
    }

    async fn count_active_users_for_role(&self, role_id: Uuid) -> Result<u64> {
        Ok(self.list_active_user_ids_for_role(role_id).await?.len() as u64)
    }

    async fn list_active_users_for_roles(&self, role_ids: &[Uuid]) -> Result<Vec<User>> {
        let state = self.lock();
        let mut seen = HashSet::new();
        let mut users: Vec<User> = state
            .assignments
            .iter()
            .filter(|a| a.is_active && role_ids.contains(&a.role_id))
            .filter_map(|a| state.users.get(&a.user_id))
            .filter(|u| u.status.is_active() && seen.insert(u.id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn list_recently_active_users(
        &self,
        within_days: Option<i64>,
        limit: i64,
    ) -> Result<Vec<User>> {
        let cutoff = within_days.map(|days| Utc::now() - ChronoDuration::days(days));
        let mut users: Vec<User> = self
            .lock()
            .users
            .values()
            .filter(|u| u.status.is_active())
            .filter(|u| match (cutoff, u.last_active_at) {
                (None, Some(_)) => true,
                (Some(cutoff), Some(at)) => at >= cutoff,
                (_, None) => false,
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn assign_roles_to_user(&self, input: &AssignRolesInput) -> Result<()> {
        let mut state = self.lock();
        for role_id in &input.role_ids {
            if let Some(existing) = state
                .assignments
                .iter_mut()
                .find(|a| a.user_id == input.user_id && a.role_id == *role_id)
            {
                existing.is_active = true;
                existing.assigned_at = Utc::now();
            } else {
                state.assignments.push(UserRoleAssignment {
                    user_id: input.user_id,
                    role_id: *role_id,
                    is_active: true,
                    assigned_at: Utc::now(),
                });
            }
        }
        Ok(())
    }

    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut state = self.lock();
        for assignment in state
            .assignments
            .iter_mut()
            .filter(|a| a.user_id == user_id && a.role_id == role_id)
        {
            assignment.is_active = false;
        }
        Ok(())
    }
}

/// Fully wired service stack over in-memory backends
pub struct TestEnv {
    pub repo: Arc<InMemoryRepository>,
    pub store: Arc<MemoryCacheStore>,
    pub cache: Arc<RolePermissionCacheService<MemoryCacheStore, InMemoryRepository>>,
    pub hierarchy: Arc<RoleHierarchyService<MemoryCacheStore, InMemoryRepository>>,
    pub admin: AccessAdminService<MemoryCacheStore, InMemoryRepository>,
}

pub fn env() -> TestEnv {
    init();

    let repo = Arc::new(InMemoryRepository::new());
    let store = Arc::new(MemoryCacheStore::new());
    let settings = CacheSettings::default();
    let cache = Arc::new(RolePermissionCacheService::new(
        store.clone(),
        repo.clone(),
        &settings,
    ));
    let hierarchy = Arc::new(RoleHierarchyService::new(
        store.clone(),
        repo.clone(),
        cache.clone(),
        &settings,
    ));
    let admin = AccessAdminService::new(repo.clone(), cache.clone(), hierarchy.clone());

    TestEnv {
        repo,
        store,
        cache,
        hierarchy,
        admin,
    }
}

/// Sorted permission-id set, for order-insensitive comparisons
pub fn id_set(permissions: &[Permission]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();
    ids.sort();
    ids
}
