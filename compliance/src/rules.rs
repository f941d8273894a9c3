use chrono::Timelike;
use common_audit::{AuditLogEntry, AuditSeverity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Regulatory frameworks the engine knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceType {
    Sox,
    Gdpr,
    Soc2,
}

impl ComplianceType {
    pub const ALL: [ComplianceType; 3] =
        [ComplianceType::Sox, ComplianceType::Gdpr, ComplianceType::Soc2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceType::Sox => "sox",
            ComplianceType::Gdpr => "gdpr",
            ComplianceType::Soc2 => "soc2",
        }
    }
}

impl fmt::Display for ComplianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown compliance framework '{0}'")]
pub struct UnknownFramework(pub String);

impl FromStr for ComplianceType {
    type Err = UnknownFramework;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sox" => Ok(ComplianceType::Sox),
            "gdpr" => Ok(ComplianceType::Gdpr),
            "soc2" => Ok(ComplianceType::Soc2),
            other => Err(UnknownFramework(other.to_string())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule's check: `Some(detail)` flags the entry as a violation.
pub type RuleCheck = Box<dyn Fn(&AuditLogEntry) -> Option<String> + Send + Sync>;

pub struct ComplianceRule {
    pub id: &'static str,
    pub compliance_type: ComplianceType,
    pub description: &'static str,
    pub severity: Severity,
    pub check: RuleCheck,
}

impl ComplianceRule {
    pub fn new(
        id: &'static str,
        compliance_type: ComplianceType,
        severity: Severity,
        description: &'static str,
        check: impl Fn(&AuditLogEntry) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            compliance_type,
            description,
            severity,
            check: Box::new(check),
        }
    }
}

impl fmt::Debug for ComplianceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplianceRule")
            .field("id", &self.id)
            .field("compliance_type", &self.compliance_type)
            .field("severity", &self.severity)
            .finish()
    }
}

const FINANCIAL_RESOURCES: &[&str] = &["promotion", "claim", "accrual", "budget"];

fn is_financial(entry: &AuditLogEntry) -> bool {
    FINANCIAL_RESOURCES.contains(&entry.event.resource.as_str())
}

/// Default rule set for a framework. The engine takes these as plain data;
/// deployments can register amended sets instead.
pub fn builtin_rules(compliance_type: ComplianceType) -> Vec<ComplianceRule> {
    match compliance_type {
        ComplianceType::Sox => vec![
            ComplianceRule::new(
                "sox-financial-record-deletion",
                ComplianceType::Sox,
                Severity::Critical,
                "Financial records must never be deleted outside a reconciliation window",
                |entry| {
                    (entry.event.success
                        && entry.event.action.ends_with(":delete")
                        && is_financial(entry))
                    .then(|| {
                        format!(
                            "financial record '{}' deleted via {}",
                            entry.event.resource, entry.event.action
                        )
                    })
                },
            ),
            ComplianceRule::new(
                "sox-unattributed-approval",
                ComplianceType::Sox,
                Severity::High,
                "Promotion approvals must carry the approving user",
                |entry| {
                    (entry.event.action == "promotions:approve"
                        && entry.event.success
                        && entry.event.actor.id.is_none())
                    .then(|| "promotion approved without an attributable actor".to_string())
                },
            ),
            ComplianceRule::new(
                "sox-denied-financial-access",
                ComplianceType::Sox,
                Severity::Low,
                "Denied access attempts against financial records are tracked",
                |entry| {
                    (!entry.event.success && is_financial(entry)).then(|| {
                        format!(
                            "denied {} on financial record '{}'",
                            entry.event.action, entry.event.resource
                        )
                    })
                },
            ),
        ],
        ComplianceType::Gdpr => vec![
            ComplianceRule::new(
                "gdpr-plaintext-pii-write",
                ComplianceType::Gdpr,
                Severity::Critical,
                "Customer PII must be written through the field-encryption path",
                |entry| {
                    let unencrypted = entry
                        .event
                        .details
                        .get("encrypted")
                        .and_then(|v| v.as_bool())
                        == Some(false);
                    let is_write = entry.event.action.ends_with(":create")
                        || entry.event.action.ends_with(":update");
                    (entry.event.success
                        && entry.event.resource == "customer"
                        && is_write
                        && unencrypted)
                        .then(|| "customer record written without field encryption".to_string())
                },
            ),
            ComplianceRule::new(
                "gdpr-bulk-customer-export",
                ComplianceType::Gdpr,
                Severity::Medium,
                "Exports of customer data are reviewed",
                |entry| {
                    (entry.event.action == "customers:export" && entry.event.success)
                        .then(|| "customer data export completed".to_string())
                },
            ),
            ComplianceRule::new(
                "gdpr-denied-pii-access",
                ComplianceType::Gdpr,
                Severity::Medium,
                "Denied access attempts against customer PII are tracked",
                |entry| {
                    (!entry.event.success && entry.event.resource == "customer").then(|| {
                        format!("denied {} on customer record", entry.event.action)
                    })
                },
            ),
        ],
        ComplianceType::Soc2 => vec![
            ComplianceRule::new(
                "soc2-decrypt-integrity-failure",
                ComplianceType::Soc2,
                Severity::Critical,
                "A failed decryption integrity check indicates stored-data tampering",
                |entry| {
                    (entry.event.action == "field:decrypt" && !entry.event.success)
                        .then(|| "field decryption rejected by integrity check".to_string())
                },
            ),
            ComplianceRule::new(
                "soc2-security-signal",
                ComplianceType::Soc2,
                Severity::High,
                "Security-severity failures feed incident review",
                |entry| {
                    (entry.event.severity == AuditSeverity::Security && !entry.event.success)
                        .then(|| format!("security event: {}", entry.event.action))
                },
            ),
            ComplianceRule::new(
                "soc2-offhours-admin-change",
                ComplianceType::Soc2,
                Severity::Medium,
                "Administrative changes outside 06:00-22:00 UTC are flagged",
                |entry| {
                    let hour = entry.recorded_at.hour();
                    let admin_action = entry.event.action.starts_with("users:manage")
                        || entry.event.action.starts_with("system:");
                    (entry.event.success && admin_action && !(6..22).contains(&hour))
                        .then(|| format!("administrative change at {:02}:00 UTC", hour))
                },
            ),
        ],
    }
}
