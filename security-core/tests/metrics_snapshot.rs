use chrono::{Duration, Utc};
use security_core::{
    AuditActor, AuditEvent, ComplianceType, KeyRing, SecurityConfig, SecurityHub,
};
use uuid::Uuid;

#[test]
fn snapshot_rolls_up_a_tenant_window() {
    let hub = SecurityHub::new(SecurityConfig::default(), KeyRing::generate());
    let tenant = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for _ in 0..6 {
        hub.record(
            AuditEvent::new(tenant, "promotions:read", "promotion")
                .actor(AuditActor::user(alice)),
        )
        .expect("record");
    }
    for _ in 0..3 {
        hub.record(
            AuditEvent::new(tenant, "customers:read", "customer").actor(AuditActor::user(bob)),
        )
        .expect("record");
    }
    hub.record(
        AuditEvent::new(tenant, "customers:update", "customer")
            .actor(AuditActor::user(bob))
            .failed("forbidden"),
    )
    .expect("record");

    // Another tenant's traffic must not leak into the snapshot.
    hub.record(AuditEvent::new(Uuid::new_v4(), "reports:read", "report"))
        .expect("record");

    let now = Utc::now();
    let snapshot = hub
        .security_metrics(tenant, now - Duration::hours(1), now + Duration::hours(1))
        .expect("snapshot");

    assert_eq!(snapshot.total_events, 10);
    assert_eq!(snapshot.successful_events, 9);
    assert_eq!(snapshot.failed_events, 1);
    assert!((snapshot.failure_rate - 0.1).abs() < f64::EPSILON);
    assert_eq!(snapshot.unique_users, 2);
    assert_eq!(snapshot.top_actions[0].0, "promotions:read");
    assert_eq!(snapshot.top_actions[0].1, 6);
    assert_eq!(snapshot.top_resources[0].0, "promotion");
    assert_eq!(snapshot.security_alerts, 0);

    // The failed customers:update stored a GDPR violation for this tenant.
    assert_eq!(snapshot.compliance_status.get(&ComplianceType::Gdpr), Some(&false));
    assert_eq!(snapshot.compliance_status.get(&ComplianceType::Sox), Some(&true));
    assert_eq!(snapshot.compliance_status.get(&ComplianceType::Soc2), Some(&true));
}

#[test]
fn empty_window_snapshot_is_all_zeroes() {
    let hub = SecurityHub::new(SecurityConfig::default(), KeyRing::generate());
    let now = Utc::now();
    let snapshot = hub
        .security_metrics(Uuid::new_v4(), now - Duration::hours(1), now)
        .expect("snapshot");
    assert_eq!(snapshot.total_events, 0);
    assert_eq!(snapshot.failure_rate, 0.0);
    assert!(snapshot.top_actions.is_empty());
    assert!(snapshot.compliance_status.values().all(|compliant| *compliant));
}
