use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use common_audit::{AuditLogEntry, AuditQuery, AuditResult, AuditSeverity, AuditStore, Pagination};
use compliance_engine::ComplianceType;

use crate::hub::SecurityHub;

const SNAPSHOT_PAGE_LIMIT: usize = 200;
const TOP_N: usize = 5;

/// Operator-facing rollup of one tenant's audit activity over a time range.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityMetricsSnapshot {
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub unique_users: usize,
    pub top_actions: Vec<(String, usize)>,
    pub top_resources: Vec<(String, usize)>,
    pub failure_rate: f64,
    pub security_alerts: usize,
    /// Per enabled framework: true when no violations were stored for the
    /// tenant in the range.
    pub compliance_status: BTreeMap<ComplianceType, bool>,
}

impl SecurityHub {
    pub fn security_metrics(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AuditResult<SecurityMetricsSnapshot> {
        let entries = collect_entries(self.log.as_ref(), tenant_id, from, to)?;

        let total_events = entries.len();
        let successful_events = entries.iter().filter(|e| e.event.success).count();
        let failed_events = total_events - successful_events;
        let failure_rate = if total_events == 0 {
            0.0
        } else {
            failed_events as f64 / total_events as f64
        };

        let unique_users = entries
            .iter()
            .filter_map(|e| e.event.actor.id)
            .collect::<HashSet<_>>()
            .len();

        let security_alerts = entries
            .iter()
            .filter(|e| e.event.severity == AuditSeverity::Security)
            .count();

        let mut compliance_status = BTreeMap::new();
        for framework in &self.config.enabled_frameworks {
            let compliant = self
                .engine
                .violations_matching(Some(tenant_id), Some(*framework), Some(from), Some(to))
                .is_empty();
            compliance_status.insert(*framework, compliant);
        }

        Ok(SecurityMetricsSnapshot {
            total_events,
            successful_events,
            failed_events,
            unique_users,
            top_actions: top_counts(entries.iter().map(|e| e.event.action.as_str())),
            top_resources: top_counts(entries.iter().map(|e| e.event.resource.as_str())),
            failure_rate,
            security_alerts,
            compliance_status,
        })
    }
}

fn top_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    // Count descending, then name ascending so equal counts order stably.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_N);
    ranked
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
                limit: SNAPSHOT_PAGE_LIMIT,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_counts_ranks_and_truncates() {
        let values = vec![
            "a", "b", "b", "c", "c", "c", "d", "e", "f", "f",
        ];
        let ranked = top_counts(values.into_iter());
        assert_eq!(ranked.len(), TOP_N);
        assert_eq!(ranked[0], ("c".to_string(), 3));
        assert_eq!(ranked[1], ("b".to_string(), 2));
        assert_eq!(ranked[2], ("f".to_string(), 2));
    }
}
