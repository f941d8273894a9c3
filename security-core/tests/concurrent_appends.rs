use security_core::{AuditActor, AuditEvent, AuditQuery, KeyRing, SecurityConfig, SecurityHub};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

const WRITERS: usize = 24;

#[test]
fn concurrent_critical_entries_yield_one_violation_and_remediation_each() {
    let hub = Arc::new(SecurityHub::new(
        SecurityConfig::default(),
        KeyRing::generate(),
    ));
    let tenant = Uuid::new_v4();

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let hub = Arc::clone(&hub);
            thread::spawn(move || {
                hub.record(
                    AuditEvent::new(tenant, "promotions:delete", "promotion")
                        .actor(AuditActor::user(Uuid::new_v4())),
                )
                .expect("record")
            })
        })
        .collect();

    let ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // No duplicate or dropped ids under concurrency.
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), WRITERS);

    // Exactly one violation per entry, each pointing at a distinct entry.
    let violations = hub.violations();
    assert_eq!(violations.len(), WRITERS);
    let referenced: HashSet<_> = violations.iter().map(|v| v.audit_entry_id).collect();
    assert_eq!(referenced, unique);

    // Exactly one remediation attempt per violation.
    assert_eq!(hub.metrics().remediation_attempts_total.get(), WRITERS as u64);
    let remediations = hub
        .get_audit_logs(&AuditQuery {
            tenant_id: Some(tenant),
            action: Some("remediation:execute".to_string()),
            ..AuditQuery::default()
        })
        .expect("query");
    assert_eq!(remediations.total, WRITERS);
}
