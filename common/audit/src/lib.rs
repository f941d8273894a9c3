pub mod log;
pub mod model;

pub use log::{AuditPage, AuditQuery, AuditStore, InMemoryAuditLog, Pagination};
pub use model::{
    AuditActor, AuditEntryId, AuditError, AuditEvent, AuditLogEntry, AuditOrigin, AuditResult,
    AuditSeverity,
};
