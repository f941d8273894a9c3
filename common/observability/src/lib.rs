use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};

#[derive(Clone)]
pub struct SecurityMetrics {
    pub registry: Registry,
    pub audit_events_total: IntCounterVec,
    pub compliance_violations_total: IntCounterVec,
    pub remediation_attempts_total: IntCounter,
    pub remediation_failures_total: IntCounter,
    pub integrity_failures_total: IntCounter,
    pub blocked_ips_total: IntCounter,
    pub suspicious_activity_total: IntCounter,
    pub retention_purged_total: IntCounter,
    pub sweep_duration_seconds: Histogram,
}

impl SecurityMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let audit_events_total = IntCounterVec::new(
            prometheus::Opts::new(
                "security_audit_events_total",
                "Audit entries appended, by outcome",
            ),
            &["outcome"],
        )
        .unwrap();
        let compliance_violations_total = IntCounterVec::new(
            prometheus::Opts::new(
                "compliance_violations_total",
                "Compliance violations raised, by severity",
            ),
            &["severity"],
        )
        .unwrap();
        let remediation_attempts_total = IntCounter::new(
            "remediation_attempts_total",
            "Auto-remediation attempts dispatched",
        )
        .unwrap();
        let remediation_failures_total = IntCounter::new(
            "remediation_failures_total",
            "Auto-remediation attempts that failed",
        )
        .unwrap();
        let integrity_failures_total = IntCounter::new(
            "field_decrypt_integrity_failures_total",
            "Field decryptions rejected by tag verification",
        )
        .unwrap();
        let blocked_ips_total = IntCounter::new(
            "failed_login_ip_blocks_total",
            "IP block signals emitted after consecutive failed logins",
        )
        .unwrap();
        let suspicious_activity_total = IntCounter::new(
            "suspicious_activity_signals_total",
            "High-frequency access signals emitted",
        )
        .unwrap();
        let retention_purged_total = IntCounter::new(
            "audit_retention_purged_total",
            "Audit entries removed by the retention sweep",
        )
        .unwrap();
        let sweep_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "audit_retention_sweep_duration_seconds",
                "Duration of a retention sweep",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )
        .unwrap();
        let _ = registry.register(Box::new(audit_events_total.clone()));
        let _ = registry.register(Box::new(compliance_violations_total.clone()));
        let _ = registry.register(Box::new(remediation_attempts_total.clone()));
        let _ = registry.register(Box::new(remediation_failures_total.clone()));
        let _ = registry.register(Box::new(integrity_failures_total.clone()));
        let _ = registry.register(Box::new(blocked_ips_total.clone()));
        let _ = registry.register(Box::new(suspicious_activity_total.clone()));
        let _ = registry.register(Box::new(retention_purged_total.clone()));
        let _ = registry.register(Box::new(sweep_duration_seconds.clone()));
        SecurityMetrics {
            registry,
            audit_events_total,
            compliance_violations_total,
            remediation_attempts_total,
            remediation_failures_total,
            integrity_failures_total,
            blocked_ips_total,
            suspicious_activity_total,
            retention_purged_total,
            sweep_duration_seconds,
        }
    }
}

impl Default for SecurityMetrics {
    fn default() -> Self {
        Self::new()
    }
}
