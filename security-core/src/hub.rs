use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use common_audit::{
    AuditActor, AuditEntryId, AuditEvent, AuditLogEntry, AuditOrigin, AuditPage, AuditQuery,
    AuditResult, AuditSeverity, AuditStore, InMemoryAuditLog,
};
use common_crypto::{CryptoError, EncryptedPayload, FieldCipher, KeyRing, KeyType};
use common_observability::SecurityMetrics;
use common_security::{AuthorizationEngine, Permission, ResourceRef, RoleStore, UserRef};
use compliance_engine::{
    builtin_rules, ComplianceReport, ComplianceRuleEngine, ComplianceType, ComplianceViolation,
    RemediationCommand,
};
use security_monitor::{MonitorConfig, SecurityMonitor, SecuritySignal};

use crate::config::SecurityConfig;
use crate::remediation::{Remediator, ReviewQueueRemediator};

/// Facade owning the audit log, compliance engine, monitor, authorization
/// engine, and field cipher. `record` is the single write path: append, then
/// evaluate, then dispatch remediation, then feed the monitor — in that
/// order, synchronously, so every violation references an entry that is
/// already durably appended.
pub struct SecurityHub {
    pub(crate) config: SecurityConfig,
    pub(crate) log: Arc<dyn AuditStore>,
    pub(crate) engine: Arc<ComplianceRuleEngine>,
    pub(crate) monitor: Arc<SecurityMonitor>,
    authz: AuthorizationEngine,
    cipher: FieldCipher,
    remediator: Arc<dyn Remediator>,
    pub(crate) metrics: SecurityMetrics,
}

impl SecurityHub {
    pub fn new(config: SecurityConfig, ring: KeyRing) -> Self {
        let engine = ComplianceRuleEngine::new();
        for framework in &config.enabled_frameworks {
            engine.register_rule_set(*framework, builtin_rules(*framework));
        }
        let monitor = SecurityMonitor::new(MonitorConfig {
            failed_login_block_threshold: config.failed_login_block_threshold,
            anomalous_access_threshold: config.anomalous_access_threshold,
        });
        Self {
            config,
            log: Arc::new(InMemoryAuditLog::new()),
            engine: Arc::new(engine),
            monitor: Arc::new(monitor),
            authz: AuthorizationEngine::new(Arc::new(RoleStore::with_builtin_catalog())),
            cipher: FieldCipher::new(ring),
            remediator: Arc::new(ReviewQueueRemediator::new()),
            metrics: SecurityMetrics::new(),
        }
    }

    /// Swap in a custom remediator (default parks violations for review).
    pub fn with_remediator(mut self, remediator: Arc<dyn Remediator>) -> Self {
        self.remediator = remediator;
        self
    }

    /// Swap in a different audit backing store.
    pub fn with_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.log = store;
        self
    }

    // ---------------- write path ----------------

    /// Append an audit entry and run the synchronous downstream pipeline.
    /// Compliance-rule failures and remediation failures never fail this
    /// call; only the append itself can.
    pub fn record(&self, event: AuditEvent) -> AuditResult<AuditEntryId> {
        let entry = self.log.append(event)?;
        let outcome = if entry.event.success { "success" } else { "failure" };
        self.metrics
            .audit_events_total
            .with_label_values(&[outcome])
            .inc();

        let violations = self.engine.evaluate(&entry);
        for violation in &violations {
            self.metrics
                .compliance_violations_total
                .with_label_values(&[violation.severity.as_str()])
                .inc();
        }
        for command in self.engine.drain_remediation_commands() {
            self.dispatch_remediation(command);
        }
        for signal in self.monitor.observe(&entry) {
            self.record_signal(&entry, signal);
        }
        Ok(entry.id)
    }

    fn dispatch_remediation(&self, command: RemediationCommand) {
        self.metrics.remediation_attempts_total.inc();
        let result = self.remediator.remediate(&command);
        let mut details = json!({
            "violation_id": command.violation_id,
            "rule_id": command.rule_id,
            "source_entry_id": command.audit_entry_id,
        });
        let mut event = AuditEvent::new(command.tenant_id, "remediation:execute", "compliance")
            .severity(AuditSeverity::Compliance)
            .origin(AuditOrigin::Remediation)
            .origin_rule(command.rule_id.clone());
        match result {
            Ok(action) => {
                details["action"] = json!(action);
            }
            Err(err) => {
                self.metrics.remediation_failures_total.inc();
                warn!(rule_id = %command.rule_id, %err, "remediation_failed");
                event = event.failed(err.to_string());
            }
        }
        if let Err(err) = self.record(event.details(details)) {
            warn!(%err, "remediation_audit_append_failed");
        }
    }

    fn record_signal(&self, entry: &AuditLogEntry, signal: SecuritySignal) {
        let event = match signal {
            SecuritySignal::IpBlocked { ip, failures } => {
                self.metrics.blocked_ips_total.inc();
                AuditEvent::new(entry.event.tenant_id, "security:ip_blocked", "security")
                    .severity(AuditSeverity::Security)
                    .origin(AuditOrigin::Monitor)
                    .ip_address(ip)
                    .details(json!({ "failures": failures }))
                    .failed(format!("{failures} consecutive failed logins"))
            }
            SecuritySignal::SuspiciousActivity {
                tenant_id,
                user_id,
                accesses_last_hour,
            } => {
                self.metrics.suspicious_activity_total.inc();
                AuditEvent::new(tenant_id, "security:suspicious_activity", "security")
                    .actor(AuditActor::user(user_id))
                    .severity(AuditSeverity::Security)
                    .origin(AuditOrigin::Monitor)
                    .details(json!({ "accesses_last_hour": accesses_last_hour }))
                    .failed("anomalous access frequency")
            }
        };
        if let Err(err) = self.record(event) {
            warn!(%err, "signal_audit_append_failed");
        }
    }

    // ---------------- authorization ----------------

    pub fn has_permission(
        &self,
        user: &UserRef,
        permission: Permission,
        resource: Option<&ResourceRef>,
    ) -> bool {
        self.authz.has_permission(user, permission, resource)
    }

    pub fn has_permission_str(
        &self,
        user: &UserRef,
        permission: &str,
        resource: Option<&ResourceRef>,
    ) -> bool {
        self.authz.has_permission_str(user, permission, resource)
    }

    pub fn authorization(&self) -> &AuthorizationEngine {
        &self.authz
    }

    pub fn roles(&self) -> &Arc<RoleStore> {
        self.authz.roles()
    }

    // ---------------- field encryption ----------------

    pub fn encrypt_field(
        &self,
        plaintext: &[u8],
        key_type: KeyType,
    ) -> Result<EncryptedPayload, CryptoError> {
        self.cipher.encrypt(plaintext, key_type)
    }

    /// Decrypt a stored payload. An integrity failure is recorded as a
    /// security incident before the error propagates; plaintext is never
    /// returned on failure.
    pub fn decrypt_field(
        &self,
        payload: &EncryptedPayload,
        tenant_id: Uuid,
        actor: AuditActor,
    ) -> Result<Vec<u8>, CryptoError> {
        match self.cipher.decrypt(payload) {
            Ok(plaintext) => Ok(plaintext),
            Err(CryptoError::IntegrityFailure) => {
                self.metrics.integrity_failures_total.inc();
                let event = AuditEvent::new(tenant_id, "field:decrypt", "field")
                    .actor(actor)
                    .severity(AuditSeverity::Security)
                    .details(json!({ "key_type": payload.key_type.as_str() }))
                    .failed("integrity check failed");
                if let Err(err) = self.record(event) {
                    warn!(%err, "integrity_audit_append_failed");
                }
                Err(CryptoError::IntegrityFailure)
            }
            Err(err) => Err(err),
        }
    }

    // ---------------- operator surface ----------------

    pub fn get_audit_logs(&self, query: &AuditQuery) -> AuditResult<AuditPage> {
        self.log.query(query)
    }

    pub fn generate_compliance_report(
        &self,
        tenant_id: Uuid,
        compliance_type: ComplianceType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AuditResult<ComplianceReport> {
        self.engine
            .generate_report(tenant_id, compliance_type, from, to, self.log.as_ref())
    }

    pub fn violations(&self) -> Vec<ComplianceViolation> {
        self.engine.violations()
    }

    /// One retention pass. Failures are logged and retried on the next tick;
    /// the underlying purge is all-or-nothing.
    pub fn run_retention_sweep(&self) -> usize {
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.retention_days));
        let timer = self.metrics.sweep_duration_seconds.start_timer();
        let removed = match self.log.purge_older_than(cutoff) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%err, "retention_sweep_failed");
                0
            }
        };
        timer.observe_duration();
        if removed > 0 {
            self.metrics.retention_purged_total.inc_by(removed as u64);
            info!(removed, "retention_sweep_completed");
        }
        removed
    }

    pub fn prometheus_registry(&self) -> &prometheus::Registry {
        &self.metrics.registry
    }

    pub fn metrics(&self) -> &SecurityMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditStore> {
        &self.log
    }
}
