use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditActor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuditActor {
    pub fn user(id: Uuid) -> Self {
        Self {
            id: Some(id),
            name: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    #[default]
    Info,
    Warning,
    Security,
    Compliance,
}

/// Provenance of an entry. Remediation- and monitor-originated entries are
/// marked so the compliance and monitoring feedback paths stay bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditOrigin {
    #[default]
    Request,
    Remediation,
    Monitor,
}

/// Monotonic sequence number assigned by the log.
pub type AuditEntryId = u64;

/// Caller-supplied event draft. The log assigns the id and timestamp;
/// anything the caller might claim about either is ignored by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tenant_id: Uuid,
    pub actor: AuditActor,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub session_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub severity: AuditSeverity,
    pub origin: AuditOrigin,
    /// Rule id that spawned this entry, set only for remediation-originated
    /// entries so that rule never re-evaluates its own output.
    pub origin_rule: Option<String>,
}

impl AuditEvent {
    pub fn new(tenant_id: Uuid, action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            tenant_id,
            actor: AuditActor::default(),
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            details: serde_json::Value::Null,
            ip_address: None,
            user_agent: None,
            success: true,
            error_message: None,
            session_id: None,
            request_id: None,
            severity: AuditSeverity::Info,
            origin: AuditOrigin::Request,
            origin_rule: None,
        }
    }

    pub fn actor(mut self, actor: AuditActor) -> Self {
        self.actor = actor;
        self
    }

    pub fn resource_id(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn ip_address(mut self, ip: IpAddr) -> Self {
        self.ip_address = Some(ip);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    pub fn session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn origin(mut self, origin: AuditOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.origin_rule = Some(rule_id.into());
        self
    }
}

/// An appended, immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
