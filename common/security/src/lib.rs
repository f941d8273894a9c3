pub mod authz;
pub mod error;
pub mod permissions;
pub mod roles;

pub use authz::{ensure_permission, AuthorizationEngine, ResourceRef, UserRef};
pub use error::SecurityError;
pub use permissions::{
    CatalogEntry, Permission, PermissionAction, PermissionCategory, PermissionCatalog,
};
pub use roles::{Role, RoleId, RoleStore};
