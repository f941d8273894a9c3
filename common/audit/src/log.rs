use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::model::{AuditEntryId, AuditEvent, AuditLogEntry, AuditResult};

const MAX_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub success: Option<bool>,
    /// Inclusive range bounds on the server-assigned timestamp.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl AuditQuery {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(tenant_id) = self.tenant_id {
            if entry.event.tenant_id != tenant_id {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if entry.event.actor.id != Some(user_id) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if entry.event.action != *action {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if entry.event.resource != *resource {
                return false;
            }
        }
        if let Some(success) = self.success {
            if entry.event.success != success {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.recorded_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.recorded_at > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Narrow append/query/purge interface so a durable backing store can replace
/// the in-memory log without touching callers.
pub trait AuditStore: Send + Sync {
    /// Assign an id and server timestamp, append, and return the entry.
    fn append(&self, event: AuditEvent) -> AuditResult<AuditLogEntry>;

    /// Filtered, newest-first, paginated read.
    fn query(&self, query: &AuditQuery) -> AuditResult<AuditPage>;

    /// Remove entries recorded strictly before the cutoff. All-or-nothing per
    /// sweep and idempotent. Returns the number of entries removed.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<usize>;

    fn entry(&self, id: AuditEntryId) -> AuditResult<Option<AuditLogEntry>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LogInner {
    next_id: AuditEntryId,
    entries: Vec<AuditLogEntry>,
}

/// In-memory audit log. A single mutex owns both the sequence counter and the
/// entry vector, so concurrent appends never interleave or duplicate ids and
/// timestamps stay non-decreasing in append order.
pub struct InMemoryAuditLog {
    inner: Mutex<LogInner>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for InMemoryAuditLog {
    fn append(&self, event: AuditEvent) -> AuditResult<AuditLogEntry> {
        let mut inner = self.inner.lock().expect("audit log lock");
        let entry = AuditLogEntry {
            id: inner.next_id,
            recorded_at: Utc::now(),
            event,
        };
        inner.next_id += 1;
        inner.entries.push(entry.clone());
        debug!(id = entry.id, action = %entry.event.action, "audit_appended");
        Ok(entry)
    }

    fn query(&self, query: &AuditQuery) -> AuditResult<AuditPage> {
        let inner = self.inner.lock().expect("audit log lock");
        // Append order is timestamp order, so reverse iteration is
        // newest-first without a sort.
        let matching: Vec<&AuditLogEntry> = inner
            .entries
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .collect();

        let total = matching.len();
        let limit = query.pagination.limit.clamp(1, MAX_PAGE_LIMIT);
        let page = query.pagination.page.max(1);
        let total_pages = total.div_ceil(limit);
        let entries = matching
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect();

        Ok(AuditPage {
            entries,
            page,
            limit,
            total,
            total_pages,
        })
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AuditResult<usize> {
        let mut inner = self.inner.lock().expect("audit log lock");
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.recorded_at >= cutoff);
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(removed, %cutoff, "audit_purged");
        }
        Ok(removed)
    }

    fn entry(&self, id: AuditEntryId) -> AuditResult<Option<AuditLogEntry>> {
        let inner = self.inner.lock().expect("audit log lock");
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("audit log lock").entries.len()
    }
}
