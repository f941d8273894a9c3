use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SecurityError;

/// Functional area a permission belongs to. Exhaustive: adding a category
/// forces every grouping match below to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Analytics,
    Reports,
    Customers,
    Products,
    Promotions,
    Workflows,
    Users,
    Audit,
    System,
}

impl PermissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCategory::Analytics => "analytics",
            PermissionCategory::Reports => "reports",
            PermissionCategory::Customers => "customers",
            PermissionCategory::Products => "products",
            PermissionCategory::Promotions => "promotions",
            PermissionCategory::Workflows => "workflows",
            PermissionCategory::Users => "users",
            PermissionCategory::Audit => "audit",
            PermissionCategory::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    Read,
    Create,
    Update,
    Delete,
    Export,
    Approve,
    Manage,
    Admin,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Read => "read",
            PermissionAction::Create => "create",
            PermissionAction::Update => "update",
            PermissionAction::Delete => "delete",
            PermissionAction::Export => "export",
            PermissionAction::Approve => "approve",
            PermissionAction::Manage => "manage",
            PermissionAction::Admin => "admin",
        }
    }

    /// Actions that mutate an existing resource and therefore require an
    /// ownership check when the resource names an owner.
    pub fn is_destructive(&self) -> bool {
        matches!(self, PermissionAction::Update | PermissionAction::Delete)
    }
}

/// A permission identifier in `category:action` wire form, e.g. `customers:read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub category: PermissionCategory,
    pub action: PermissionAction,
}

impl Permission {
    pub const SYSTEM_ADMIN: Permission = Permission {
        category: PermissionCategory::System,
        action: PermissionAction::Admin,
    };

    pub const fn new(category: PermissionCategory, action: PermissionAction) -> Self {
        Self { category, action }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category.as_str(), self.action.as_str())
    }
}

impl FromStr for Permission {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, action) = s
            .split_once(':')
            .ok_or_else(|| SecurityError::UnknownPermission(s.to_string()))?;
        let category = match category {
            "analytics" => PermissionCategory::Analytics,
            "reports" => PermissionCategory::Reports,
            "customers" => PermissionCategory::Customers,
            "products" => PermissionCategory::Products,
            "promotions" => PermissionCategory::Promotions,
            "workflows" => PermissionCategory::Workflows,
            "users" => PermissionCategory::Users,
            "audit" => PermissionCategory::Audit,
            "system" => PermissionCategory::System,
            _ => return Err(SecurityError::UnknownPermission(s.to_string())),
        };
        let action = match action {
            "read" => PermissionAction::Read,
            "create" => PermissionAction::Create,
            "update" => PermissionAction::Update,
            "delete" => PermissionAction::Delete,
            "export" => PermissionAction::Export,
            "approve" => PermissionAction::Approve,
            "manage" => PermissionAction::Manage,
            "admin" => PermissionAction::Admin,
            _ => return Err(SecurityError::UnknownPermission(s.to_string())),
        };
        Ok(Permission { category, action })
    }
}

/// One registered permission with its operator-facing label.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub permission: Permission,
    pub display_name: &'static str,
}

macro_rules! entry {
    ($cat:ident, $act:ident, $label:expr) => {
        CatalogEntry {
            permission: Permission::new(PermissionCategory::$cat, PermissionAction::$act),
            display_name: $label,
        }
    };
}

/// Every permission the platform recognises. Role grants outside this set are
/// legal to store but can never match a registered permission.
const CATALOG: &[CatalogEntry] = &[
    entry!(Analytics, Read, "View analytics"),
    entry!(Reports, Read, "View reports"),
    entry!(Reports, Export, "Export reports"),
    entry!(Customers, Read, "View customers"),
    entry!(Customers, Create, "Create customers"),
    entry!(Customers, Update, "Edit customers"),
    entry!(Customers, Delete, "Delete customers"),
    entry!(Customers, Export, "Export customer data"),
    entry!(Products, Read, "View products"),
    entry!(Products, Create, "Create products"),
    entry!(Products, Update, "Edit products"),
    entry!(Products, Delete, "Delete products"),
    entry!(Promotions, Read, "View promotions"),
    entry!(Promotions, Create, "Create promotions"),
    entry!(Promotions, Update, "Edit promotions"),
    entry!(Promotions, Delete, "Delete promotions"),
    entry!(Promotions, Approve, "Approve promotions"),
    entry!(Workflows, Read, "View workflows"),
    entry!(Workflows, Update, "Edit workflows"),
    entry!(Users, Read, "View users"),
    entry!(Users, Manage, "Manage users"),
    entry!(Audit, Read, "View audit log"),
    entry!(System, Admin, "System administration"),
];

/// Static catalog of registered permissions, grouped by category.
pub struct PermissionCatalog;

impl PermissionCatalog {
    pub fn entries() -> &'static [CatalogEntry] {
        CATALOG
    }

    pub fn contains(permission: Permission) -> bool {
        CATALOG.iter().any(|e| e.permission == permission)
    }

    pub fn by_category(
        category: PermissionCategory,
    ) -> impl Iterator<Item = &'static CatalogEntry> {
        CATALOG
            .iter()
            .filter(move |e| e.permission.category == category)
    }

    pub fn display_name(permission: Permission) -> Option<&'static str> {
        CATALOG
            .iter()
            .find(|e| e.permission == permission)
            .map(|e| e.display_name)
    }
}
