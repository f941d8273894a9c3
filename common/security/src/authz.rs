use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::permissions::Permission;
use crate::roles::{RoleId, RoleStore};
use crate::SecurityError;

/// Authenticated caller, as established by the embedding auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub roles: SmallVec<[RoleId; 4]>,
}

impl UserRef {
    pub fn new(id: Uuid, tenant_id: Uuid, roles: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            id,
            tenant_id,
            roles: roles.into_iter().collect(),
        }
    }
}

/// Target of a permission check. Either field may be absent: a resource with
/// neither tenant nor owner adds no restriction beyond the role grant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceRef {
    pub tenant_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

impl ResourceRef {
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            owner_id: None,
        }
    }

    pub fn owned(tenant_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            owner_id: Some(owner_id),
        }
    }
}

/// Pure decision point: no side effects, no logging.
#[derive(Clone)]
pub struct AuthorizationEngine {
    roles: Arc<RoleStore>,
}

impl AuthorizationEngine {
    pub fn new(roles: Arc<RoleStore>) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &Arc<RoleStore> {
        &self.roles
    }

    pub fn has_permission(
        &self,
        user: &UserRef,
        permission: Permission,
        resource: Option<&ResourceRef>,
    ) -> bool {
        if user.roles.is_empty() {
            return false;
        }
        if !self.roles.any_grants(&user.roles, permission) {
            return false;
        }
        match resource {
            None => true,
            Some(resource) => self.resource_allows(user, permission, resource),
        }
    }

    /// Wire-form variant. Unknown identifiers deny rather than error.
    pub fn has_permission_str(
        &self,
        user: &UserRef,
        permission: &str,
        resource: Option<&ResourceRef>,
    ) -> bool {
        match Permission::from_str(permission) {
            Ok(permission) => self.has_permission(user, permission, resource),
            Err(_) => false,
        }
    }

    fn resource_allows(
        &self,
        user: &UserRef,
        permission: Permission,
        resource: &ResourceRef,
    ) -> bool {
        // Tenant isolation is a hard boundary: no role, including
        // system:admin, crosses it.
        if let Some(tenant_id) = resource.tenant_id {
            if tenant_id != user.tenant_id {
                return false;
            }
        }
        if permission.action.is_destructive() {
            if let Some(owner_id) = resource.owner_id {
                if owner_id != user.id
                    && !self.roles.any_grants(&user.roles, Permission::SYSTEM_ADMIN)
                {
                    return false;
                }
            }
        }
        true
    }
}

/// Guard-style wrapper for call sites that want a `Result`: denial becomes
/// `SecurityError::Forbidden` and is logged.
pub fn ensure_permission(
    engine: &AuthorizationEngine,
    user: &UserRef,
    permission: Permission,
    resource: Option<&ResourceRef>,
) -> Result<(), SecurityError> {
    if engine.has_permission(user, permission, resource) {
        return Ok(());
    }
    warn!(
        tenant_id = %user.tenant_id,
        user_id = %user.id,
        %permission,
        roles = ?user.roles,
        "permission_check_failed"
    );
    Err(SecurityError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{PermissionAction, PermissionCategory};

    fn engine() -> AuthorizationEngine {
        AuthorizationEngine::new(Arc::new(RoleStore::with_builtin_catalog()))
    }

    fn user(tenant: Uuid, role: &str) -> UserRef {
        UserRef::new(Uuid::new_v4(), tenant, [RoleId::new(role)])
    }

    #[test]
    fn no_roles_denies_everything() {
        let engine = engine();
        let user = UserRef::new(Uuid::new_v4(), Uuid::new_v4(), []);
        assert!(!engine.has_permission(
            &user,
            Permission::new(PermissionCategory::Customers, PermissionAction::Read),
            None
        ));
    }

    #[test]
    fn tenant_isolation_beats_system_admin() {
        let engine = engine();
        let tenant = Uuid::new_v4();
        let admin = user(tenant, "admin");
        let foreign = ResourceRef::tenant(Uuid::new_v4());
        assert!(engine.has_permission(&admin, Permission::SYSTEM_ADMIN, None));
        assert!(!engine.has_permission(
            &admin,
            Permission::new(PermissionCategory::Customers, PermissionAction::Read),
            Some(&foreign)
        ));
    }

    #[test]
    fn ownership_required_for_destructive_actions() {
        let engine = engine();
        let tenant = Uuid::new_v4();
        let manager = user(tenant, "manager");
        let someone_else = ResourceRef::owned(tenant, Uuid::new_v4());
        let update = Permission::new(PermissionCategory::Customers, PermissionAction::Update);

        assert!(!engine.has_permission(&manager, update, Some(&someone_else)));

        let own = ResourceRef::owned(tenant, manager.id);
        assert!(engine.has_permission(&manager, update, Some(&own)));

        // system:admin overrides the ownership requirement within the tenant.
        let admin = user(tenant, "admin");
        assert!(engine.has_permission(&admin, update, Some(&someone_else)));
    }

    #[test]
    fn non_destructive_actions_ignore_ownership() {
        let engine = engine();
        let tenant = Uuid::new_v4();
        let viewer = user(tenant, "viewer");
        let someone_else = ResourceRef::owned(tenant, Uuid::new_v4());
        assert!(engine.has_permission(
            &viewer,
            Permission::new(PermissionCategory::Customers, PermissionAction::Read),
            Some(&someone_else)
        ));
    }

    #[test]
    fn unknown_permission_strings_deny() {
        let engine = engine();
        let viewer = user(Uuid::new_v4(), "viewer");
        assert!(!engine.has_permission_str(&viewer, "widgets:read", None));
        assert!(!engine.has_permission_str(&viewer, "garbage", None));
    }

    #[test]
    fn viewer_role_access_matrix() {
        let engine = engine();
        let t1 = Uuid::new_v4();
        let a = user(t1, "viewer");
        let in_t1 = ResourceRef::tenant(t1);
        let in_t2 = ResourceRef::tenant(Uuid::new_v4());

        assert!(!engine.has_permission_str(&a, "customers:update", Some(&in_t1)));
        assert!(engine.has_permission_str(&a, "customers:read", Some(&in_t1)));
        assert!(!engine.has_permission_str(&a, "customers:read", Some(&in_t2)));
    }
}
