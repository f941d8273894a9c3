use chrono::{DateTime, Utc};
use common_audit::{AuditEntryId, AuditLogEntry, AuditOrigin};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::rules::{ComplianceRule, ComplianceType, Severity};

/// An active violation. Created by `evaluate`; immutable. `audit_entry_id`
/// always references an entry that was appended before evaluation ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub compliance_type: ComplianceType,
    pub rule_id: String,
    pub severity: Severity,
    pub audit_entry_id: AuditEntryId,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub detail: String,
}

/// Work item for the remediation path. Queued for critical violations and
/// drained by the hub; a command leaves the queue only once its attempt has
/// been made and audited (at-least-once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationCommand {
    pub violation_id: Uuid,
    pub rule_id: String,
    pub compliance_type: ComplianceType,
    pub severity: Severity,
    pub tenant_id: Uuid,
    pub audit_entry_id: AuditEntryId,
}

/// Evaluates registered rule sets against audit entries as they are appended.
pub struct ComplianceRuleEngine {
    rule_sets: RwLock<BTreeMap<ComplianceType, Vec<ComplianceRule>>>,
    violations: Mutex<Vec<ComplianceViolation>>,
    pending_remediations: Mutex<VecDeque<RemediationCommand>>,
}

impl ComplianceRuleEngine {
    pub fn new() -> Self {
        Self {
            rule_sets: RwLock::new(BTreeMap::new()),
            violations: Mutex::new(Vec::new()),
            pending_remediations: Mutex::new(VecDeque::new()),
        }
    }

    /// Associate a framework with an ordered rule set, replacing any previous
    /// registration for that framework.
    pub fn register_rule_set(&self, compliance_type: ComplianceType, rules: Vec<ComplianceRule>) {
        self.rule_sets
            .write()
            .expect("rule set lock")
            .insert(compliance_type, rules);
    }

    pub fn registered_frameworks(&self) -> Vec<ComplianceType> {
        self.rule_sets
            .read()
            .expect("rule set lock")
            .keys()
            .copied()
            .collect()
    }

    /// Run every registered rule against the entry. A panicking rule is
    /// logged and skipped; it never aborts the remaining rules or the caller.
    /// Returns the violations raised; critical ones also queue a
    /// [`RemediationCommand`].
    pub fn evaluate(&self, entry: &AuditLogEntry) -> Vec<ComplianceViolation> {
        let rule_sets = self.rule_sets.read().expect("rule set lock");
        let mut raised = Vec::new();
        for rules in rule_sets.values() {
            for rule in rules {
                if excluded_by_loop_control(entry, rule.id) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| (rule.check)(entry)));
                let detail = match outcome {
                    Ok(Some(detail)) => detail,
                    Ok(None) => continue,
                    Err(_) => {
                        warn!(rule_id = rule.id, entry_id = entry.id, "compliance_rule_panicked");
                        continue;
                    }
                };
                let violation = ComplianceViolation {
                    id: Uuid::new_v4(),
                    detected_at: Utc::now(),
                    compliance_type: rule.compliance_type,
                    rule_id: rule.id.to_string(),
                    severity: rule.severity,
                    audit_entry_id: entry.id,
                    tenant_id: entry.event.tenant_id,
                    user_id: entry.event.actor.id,
                    detail,
                };
                warn!(
                    rule_id = rule.id,
                    severity = %rule.severity,
                    tenant_id = %violation.tenant_id,
                    audit_entry_id = entry.id,
                    "compliance_violation"
                );
                // Follow-up entries (remediation, monitor signals) can raise
                // violations but never spawn further remediation, so a chain
                // of critical rules cannot ping-pong through the queue.
                if violation.severity == Severity::Critical
                    && entry.event.origin == AuditOrigin::Request
                {
                    self.pending_remediations
                        .lock()
                        .expect("remediation queue lock")
                        .push_back(RemediationCommand {
                            violation_id: violation.id,
                            rule_id: violation.rule_id.clone(),
                            compliance_type: violation.compliance_type,
                            severity: violation.severity,
                            tenant_id: violation.tenant_id,
                            audit_entry_id: violation.audit_entry_id,
                        });
                }
                self.violations
                    .lock()
                    .expect("violation store lock")
                    .push(violation.clone());
                raised.push(violation);
            }
        }
        raised
    }

    /// Re-run one framework's rules against an entry without storing
    /// violations or queueing remediation. Used by report generation.
    pub(crate) fn evaluate_readonly(
        &self,
        compliance_type: ComplianceType,
        entry: &AuditLogEntry,
    ) -> Vec<ComplianceViolation> {
        let rule_sets = self.rule_sets.read().expect("rule set lock");
        let Some(rules) = rule_sets.get(&compliance_type) else {
            return Vec::new();
        };
        let mut raised = Vec::new();
        for rule in rules {
            if excluded_by_loop_control(entry, rule.id) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (rule.check)(entry)));
            if let Ok(Some(detail)) = outcome {
                raised.push(ComplianceViolation {
                    id: Uuid::new_v4(),
                    detected_at: entry.recorded_at,
                    compliance_type: rule.compliance_type,
                    rule_id: rule.id.to_string(),
                    severity: rule.severity,
                    audit_entry_id: entry.id,
                    tenant_id: entry.event.tenant_id,
                    user_id: entry.event.actor.id,
                    detail,
                });
            } else if outcome.is_err() {
                warn!(rule_id = rule.id, entry_id = entry.id, "compliance_rule_panicked");
            }
        }
        raised
    }

    pub(crate) fn with_rules<T>(
        &self,
        compliance_type: ComplianceType,
        f: impl FnOnce(&[ComplianceRule]) -> T,
    ) -> T {
        let rule_sets = self.rule_sets.read().expect("rule set lock");
        f(rule_sets
            .get(&compliance_type)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[]))
    }

    /// Take every queued remediation command.
    pub fn drain_remediation_commands(&self) -> Vec<RemediationCommand> {
        self.pending_remediations
            .lock()
            .expect("remediation queue lock")
            .drain(..)
            .collect()
    }

    pub fn violations(&self) -> Vec<ComplianceViolation> {
        self.violations
            .lock()
            .expect("violation store lock")
            .clone()
    }

    /// Stored violations filtered by tenant, framework, and detection range.
    pub fn violations_matching(
        &self,
        tenant_id: Option<Uuid>,
        compliance_type: Option<ComplianceType>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<ComplianceViolation> {
        self.violations
            .lock()
            .expect("violation store lock")
            .iter()
            .filter(|v| tenant_id.map_or(true, |t| v.tenant_id == t))
            .filter(|v| compliance_type.map_or(true, |c| v.compliance_type == c))
            .filter(|v| from.map_or(true, |f| v.detected_at >= f))
            .filter(|v| to.map_or(true, |t| v.detected_at <= t))
            .cloned()
            .collect()
    }
}

impl Default for ComplianceRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loop control: a remediation-originated entry never re-triggers the rule
/// that spawned it. Every other rule still sees the entry.
fn excluded_by_loop_control(entry: &AuditLogEntry, rule_id: &str) -> bool {
    entry.event.origin == AuditOrigin::Remediation
        && entry.event.origin_rule.as_deref() == Some(rule_id)
}
