use security_core::{
    AuditActor, AuditEvent, AuditQuery, AuditSeverity, KeyRing, SecurityConfig, SecurityHub,
};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

fn hub() -> SecurityHub {
    SecurityHub::new(SecurityConfig::default(), KeyRing::generate())
}

fn source_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))
}

#[test]
fn fifth_failed_login_appends_ip_blocked_entry() {
    let hub = hub();
    let tenant = Uuid::new_v4();

    for _ in 0..4 {
        hub.record(
            AuditEvent::new(tenant, "auth:login", "auth")
                .ip_address(source_ip())
                .failed("bad credentials"),
        )
        .expect("record");
    }
    let blocked = |hub: &SecurityHub| {
        hub.get_audit_logs(&AuditQuery {
            tenant_id: Some(tenant),
            action: Some("security:ip_blocked".to_string()),
            ..AuditQuery::default()
        })
        .expect("query")
        .total
    };
    assert_eq!(blocked(&hub), 0);

    hub.record(
        AuditEvent::new(tenant, "auth:login", "auth")
            .ip_address(source_ip())
            .failed("bad credentials"),
    )
    .expect("record");
    assert_eq!(blocked(&hub), 1);

    let entry = &hub
        .get_audit_logs(&AuditQuery {
            tenant_id: Some(tenant),
            action: Some("security:ip_blocked".to_string()),
            ..AuditQuery::default()
        })
        .expect("query")
        .entries[0];
    assert!(!entry.event.success);
    assert_eq!(entry.event.severity, AuditSeverity::Security);
    assert_eq!(entry.event.ip_address, Some(source_ip()));
}

#[test]
fn successful_login_resets_the_streak() {
    let hub = hub();
    let tenant = Uuid::new_v4();

    for _ in 0..4 {
        hub.record(
            AuditEvent::new(tenant, "auth:login", "auth")
                .ip_address(source_ip())
                .failed("bad credentials"),
        )
        .expect("record");
    }
    hub.record(AuditEvent::new(tenant, "auth:login", "auth").ip_address(source_ip()))
        .expect("record");

    assert_eq!(hub.monitor().failed_login_count(source_ip()), 0);
}

#[test]
fn high_frequency_access_appends_one_suspicious_entry() {
    let hub = hub();
    let tenant = Uuid::new_v4();
    let user = Uuid::new_v4();

    for _ in 0..60 {
        hub.record(
            AuditEvent::new(tenant, "promotions:read", "promotion")
                .actor(AuditActor::user(user)),
        )
        .expect("record");
    }

    let suspicious = hub
        .get_audit_logs(&AuditQuery {
            tenant_id: Some(tenant),
            action: Some("security:suspicious_activity".to_string()),
            ..AuditQuery::default()
        })
        .expect("query");
    // Flagged once, not once per access past the threshold.
    assert_eq!(suspicious.total, 1);
    let entry = &suspicious.entries[0];
    assert!(!entry.event.success);
    assert_eq!(entry.event.severity, AuditSeverity::Security);
    assert_eq!(entry.event.actor.id, Some(user));

    // The feedback entry is a single bounded follow-up: 60 accesses plus one
    // monitor entry, and the monitor entry itself is never counted as access.
    let all = hub
        .get_audit_logs(&AuditQuery::for_tenant(tenant))
        .expect("query");
    assert_eq!(all.total, 61);
}
