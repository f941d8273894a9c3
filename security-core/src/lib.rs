pub mod config;
pub mod hub;
pub mod metrics;
pub mod remediation;
pub mod tasks;

pub use config::{load_security_config, SecurityConfig};
pub use hub::SecurityHub;
pub use metrics::SecurityMetricsSnapshot;
pub use remediation::{Remediator, ReviewQueueRemediator};

pub use common_audit::{
    AuditActor, AuditEntryId, AuditEvent, AuditLogEntry, AuditOrigin, AuditPage, AuditQuery,
    AuditSeverity, AuditStore, InMemoryAuditLog, Pagination,
};
pub use common_crypto::{CryptoError, EncryptedPayload, FieldCipher, KeyRing, KeyType};
pub use common_security::{
    AuthorizationEngine, Permission, PermissionCatalog, ResourceRef, Role, RoleId, RoleStore,
    UserRef,
};
pub use compliance_engine::{
    builtin_rules, ComplianceReport, ComplianceRule, ComplianceRuleEngine, ComplianceType,
    ComplianceViolation, RemediationCommand, Severity,
};
pub use security_monitor::{MonitorConfig, SecurityMonitor, SecuritySignal};
