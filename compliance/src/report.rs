use chrono::{DateTime, Utc};
use common_audit::{AuditLogEntry, AuditQuery, AuditResult, AuditStore, Pagination};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::engine::{ComplianceRuleEngine, ComplianceViolation};
use crate::rules::{ComplianceType, Severity};

const REPORT_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub violations: usize,
    pub by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub description: String,
    pub severity: Severity,
    pub compliant: bool,
    pub violations: Vec<ComplianceViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub tenant_id: Uuid,
    pub compliance_type: ComplianceType,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub rule_results: Vec<RuleResult>,
    pub recommendations: Vec<String>,
}

impl ComplianceRuleEngine {
    /// Re-evaluate one framework's rules over the tenant's audit slice.
    /// Read-only and deterministic for a fixed slice and rule set: nothing is
    /// stored and no remediation is queued.
    pub fn generate_report(
        &self,
        tenant_id: Uuid,
        compliance_type: ComplianceType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        store: &dyn AuditStore,
    ) -> AuditResult<ComplianceReport> {
        let entries = collect_entries(store, tenant_id, from, to)?;

        // Seed results from the registered rule order so compliant rules
        // still appear in the report.
        let mut rule_results: Vec<RuleResult> = {
            let rule_sets = self.rule_descriptions(compliance_type);
            rule_sets
                .into_iter()
                .map(|(rule_id, description, severity)| RuleResult {
                    rule_id,
                    description,
                    severity,
                    compliant: true,
                    violations: Vec::new(),
                })
                .collect()
        };

        let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
        let mut total_violations = 0;
        for entry in &entries {
            for violation in self.evaluate_readonly(compliance_type, entry) {
                total_violations += 1;
                *by_severity.entry(violation.severity).or_insert(0) += 1;
                if let Some(result) = rule_results
                    .iter_mut()
                    .find(|r| r.rule_id == violation.rule_id)
                {
                    result.compliant = false;
                    result.violations.push(violation);
                }
            }
        }

        let mut recommendations = Vec::new();
        if by_severity.contains_key(&Severity::Critical) {
            recommendations
                .push("Critical violations present: address immediately".to_string());
        }
        if !entries.is_empty() && total_violations * 10 > entries.len() {
            recommendations.push(
                "Violation rate exceeds 10% of audited events: review policies".to_string(),
            );
        }
        if total_violations == 0 {
            recommendations.push("No violations in the reporting window".to_string());
        }

        Ok(ComplianceReport {
            tenant_id,
            compliance_type,
            from,
            to,
            generated_at: Utc::now(),
            summary: ReportSummary {
                total_events: entries.len(),
                violations: total_violations,
                by_severity,
            },
            rule_results,
            recommendations,
        })
    }

    fn rule_descriptions(
        &self,
        compliance_type: ComplianceType,
    ) -> Vec<(String, String, Severity)> {
        self.with_rules(compliance_type, |rules| {
            rules
                .iter()
                .map(|r| (r.id.to_string(), r.description.to_string(), r.severity))
                .collect()
        })
    }
}

fn collect_entries(
    store: &dyn AuditStore,
    tenant_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AuditResult<Vec<AuditLogEntry>> {
    let mut entries = Vec::new();
    let mut page = 1;
    loop {
        let result = store.query(&AuditQuery {
            tenant_id: Some(tenant_id),
            from: Some(from),
            to: Some(to),
            pagination: Pagination {
                page,
                limit: REPORT_PAGE_LIMIT,
            },
            ..AuditQuery::default()
        })?;
        let done = result.entries.len() < result.limit;
        entries.extend(result.entries);
        if done {
            break;
        }
        page += 1;
    }
    Ok(entries)
}
