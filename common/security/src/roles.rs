use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;

use crate::permissions::{Permission, PermissionAction, PermissionCategory, PermissionCatalog};

/// Lowercase role identifier, e.g. `admin` or `viewer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub display_name: String,
    pub description: String,
    pub permissions: HashSet<Permission>,
}

impl Role {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            id: RoleId::new(id),
            display_name: display_name.into(),
            description: description.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Arena of roles keyed by id. Mutations go through explicit administrative
/// operations; lookups clone out so callers never hold the lock.
pub struct RoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl RoleStore {
    pub fn empty() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
        }
    }

    /// Store seeded with the platform's builtin roles.
    pub fn with_builtin_catalog() -> Self {
        let store = Self::empty();
        for role in builtin_roles() {
            store.upsert(role);
        }
        store
    }

    pub fn get(&self, id: &RoleId) -> Option<Role> {
        self.roles.read().expect("role store lock").get(id).cloned()
    }

    pub fn upsert(&self, role: Role) {
        self.roles
            .write()
            .expect("role store lock")
            .insert(role.id.clone(), role);
    }

    pub fn remove(&self, id: &RoleId) -> Option<Role> {
        self.roles.write().expect("role store lock").remove(id)
    }

    pub fn all(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .roles
            .read()
            .expect("role store lock")
            .values()
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        roles
    }

    /// True when any of the listed roles grants the permission. Unknown role
    /// ids contribute no grants.
    pub fn any_grants(&self, role_ids: &[RoleId], permission: Permission) -> bool {
        let roles = self.roles.read().expect("role store lock");
        role_ids
            .iter()
            .filter_map(|id| roles.get(id))
            .any(|role| role.grants(permission))
    }
}

fn builtin_roles() -> Vec<Role> {
    let read_all = [
        PermissionCategory::Analytics,
        PermissionCategory::Reports,
        PermissionCategory::Customers,
        PermissionCategory::Products,
        PermissionCategory::Promotions,
        PermissionCategory::Workflows,
    ]
    .into_iter()
    .map(|category| Permission::new(category, PermissionAction::Read));

    let admin = Role::new(
        "admin",
        "Administrator",
        "Full access to every registered permission",
        PermissionCatalog::entries().iter().map(|e| e.permission),
    );

    let manager = Role::new(
        "manager",
        "Trade Manager",
        "Plans and approves promotions, edits customers and products",
        read_all.clone().chain([
            Permission::new(PermissionCategory::Customers, PermissionAction::Create),
            Permission::new(PermissionCategory::Customers, PermissionAction::Update),
            Permission::new(PermissionCategory::Products, PermissionAction::Create),
            Permission::new(PermissionCategory::Products, PermissionAction::Update),
            Permission::new(PermissionCategory::Promotions, PermissionAction::Create),
            Permission::new(PermissionCategory::Promotions, PermissionAction::Update),
            Permission::new(PermissionCategory::Promotions, PermissionAction::Approve),
            Permission::new(PermissionCategory::Workflows, PermissionAction::Update),
        ]),
    );

    let analyst = Role::new(
        "analyst",
        "Trade Analyst",
        "Read access plus report exports",
        read_all.clone().chain([Permission::new(
            PermissionCategory::Reports,
            PermissionAction::Export,
        )]),
    );

    let viewer = Role::new(
        "viewer",
        "Viewer",
        "Read-only access to core entities",
        read_all,
    );

    vec![admin, manager, analyst, viewer]
}
