use chrono::{DateTime, Duration, Utc};
use common_audit::{AuditLogEntry, AuditOrigin};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Login attempts arrive under this action name.
pub const LOGIN_ACTION: &str = "auth:login";

/// Cap on retained samples per user; the oldest sample is evicted first.
const ACCESS_WINDOW_CAP: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Consecutive failed logins from one source IP before an
    /// [`SecuritySignal::IpBlocked`] signal is emitted.
    pub failed_login_block_threshold: u32,
    /// Accesses per trailing hour per user before a
    /// [`SecuritySignal::SuspiciousActivity`] signal is emitted.
    pub anomalous_access_threshold: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failed_login_block_threshold: 5,
            anomalous_access_threshold: 50,
        }
    }
}

/// Signals derived from the audit stream. Enforcement (firewall rules,
/// session revocation) belongs to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecuritySignal {
    IpBlocked {
        ip: IpAddr,
        failures: u32,
    },
    SuspiciousActivity {
        tenant_id: Uuid,
        user_id: Uuid,
        accesses_last_hour: usize,
    },
}

/// One tracked access: what was touched and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSample {
    pub at: DateTime<Utc>,
    pub resource: String,
    pub action: String,
}

#[derive(Default)]
struct MonitorState {
    failed_logins: HashMap<IpAddr, u32>,
    windows: HashMap<Uuid, VecDeque<AccessSample>>,
    last_flagged: HashMap<Uuid, DateTime<Utc>>,
}

/// Derives rate and anomaly signals from audit entries and explicit counters.
/// All state sits behind one mutex; increments are never lost under
/// concurrent observation.
pub struct SecurityMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
}

impl SecurityMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Feed one appended entry through the trackers.
    pub fn observe(&self, entry: &AuditLogEntry) -> Vec<SecuritySignal> {
        let mut signals = Vec::new();

        if entry.event.action == LOGIN_ACTION {
            if let Some(ip) = entry.event.ip_address {
                if let Some(signal) = self.record_login_outcome(ip, entry.event.success) {
                    signals.push(signal);
                }
            }
        }

        // Only request-originated entries count as user activity: monitor- and
        // remediation-originated entries would otherwise feed the window they
        // themselves triggered.
        if entry.event.origin == AuditOrigin::Request {
            if let Some(user_id) = entry.event.actor.id {
                if let Some(signal) = self.record_access(
                    entry.event.tenant_id,
                    user_id,
                    entry.recorded_at,
                    &entry.event.resource,
                    &entry.event.action,
                ) {
                    signals.push(signal);
                }
            }
        }

        signals
    }

    /// Explicit failed-login counter. A success resets the streak; reaching
    /// the threshold emits the block signal and resets.
    pub fn record_login_outcome(&self, ip: IpAddr, success: bool) -> Option<SecuritySignal> {
        let mut state = self.state.lock().expect("monitor lock");
        if success {
            state.failed_logins.remove(&ip);
            return None;
        }
        let failures = state.failed_logins.entry(ip).or_insert(0);
        *failures += 1;
        if *failures >= self.config.failed_login_block_threshold {
            let failures = *failures;
            state.failed_logins.remove(&ip);
            warn!(%ip, failures, "failed_login_threshold_reached");
            return Some(SecuritySignal::IpBlocked { ip, failures });
        }
        None
    }

    /// Explicit access-pattern counter over a bounded sliding window.
    pub fn record_access(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
        resource: &str,
        action: &str,
    ) -> Option<SecuritySignal> {
        let mut state = self.state.lock().expect("monitor lock");
        let window = state.windows.entry(user_id).or_default();
        window.push_back(AccessSample {
            at,
            resource: resource.to_string(),
            action: action.to_string(),
        });
        while window.len() > ACCESS_WINDOW_CAP {
            window.pop_front();
        }

        let cutoff = at - Duration::hours(1);
        let recent = window.iter().filter(|s| s.at >= cutoff).count();
        if recent <= self.config.anomalous_access_threshold {
            return None;
        }

        // One signal per user per hour; the window keeps filling regardless.
        if let Some(flagged_at) = state.last_flagged.get(&user_id) {
            if at - *flagged_at < Duration::hours(1) {
                return None;
            }
        }
        state.last_flagged.insert(user_id, at);
        warn!(%tenant_id, %user_id, recent, "anomalous_access_pattern");
        Some(SecuritySignal::SuspiciousActivity {
            tenant_id,
            user_id,
            accesses_last_hour: recent,
        })
    }

    /// Retained access samples for a user, oldest first.
    pub fn recent_activity(&self, user_id: Uuid) -> Vec<AccessSample> {
        self.state
            .lock()
            .expect("monitor lock")
            .windows
            .get(&user_id)
            .map(|window| window.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Current consecutive-failure count for a source IP.
    pub fn failed_login_count(&self, ip: IpAddr) -> u32 {
        self.state
            .lock()
            .expect("monitor lock")
            .failed_logins
            .get(&ip)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_audit::AuditEvent;
    use std::net::Ipv4Addr;

    fn monitor() -> SecurityMonitor {
        SecurityMonitor::new(MonitorConfig::default())
    }

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))
    }

    #[test]
    fn fifth_consecutive_failure_blocks_ip() {
        let monitor = monitor();
        for _ in 0..4 {
            assert_eq!(monitor.record_login_outcome(ip(), false), None);
        }
        assert_eq!(
            monitor.record_login_outcome(ip(), false),
            Some(SecuritySignal::IpBlocked {
                ip: ip(),
                failures: 5
            })
        );
        // Counter reset after the signal.
        assert_eq!(monitor.failed_login_count(ip()), 0);
    }

    #[test]
    fn success_resets_the_streak() {
        let monitor = monitor();
        for _ in 0..4 {
            let _ = monitor.record_login_outcome(ip(), false);
        }
        let _ = monitor.record_login_outcome(ip(), true);
        assert_eq!(monitor.failed_login_count(ip()), 0);
        assert_eq!(monitor.record_login_outcome(ip(), false), None);
    }

    #[test]
    fn high_frequency_access_is_flagged_once_per_hour() {
        let monitor = monitor();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let start = Utc::now();

        let mut signals = Vec::new();
        for i in 0..60 {
            let at = start + Duration::seconds(i);
            if let Some(signal) = monitor.record_access(tenant, user, at, "promotion", "promotions:read") {
                signals.push(signal);
            }
        }
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            SecuritySignal::SuspiciousActivity {
                accesses_last_hour, ..
            } => assert!(*accesses_last_hour > 50),
            other => panic!("unexpected signal {other:?}"),
        }

        // A second burst an hour later flags again.
        let later = start + Duration::hours(2);
        let mut later_signals = Vec::new();
        for i in 0..60 {
            if let Some(signal) =
                monitor.record_access(tenant, user, later + Duration::seconds(i), "promotion", "promotions:read")
            {
                later_signals.push(signal);
            }
        }
        assert_eq!(later_signals.len(), 1);
    }

    #[test]
    fn window_is_bounded_to_last_100_samples() {
        let monitor = monitor();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let start = Utc::now();
        for i in 0..300 {
            let _ = monitor.record_access(
                tenant,
                user,
                start + Duration::seconds(i),
                "report",
                "reports:read",
            );
        }
        assert_eq!(monitor.recent_activity(user).len(), ACCESS_WINDOW_CAP);
    }

    #[test]
    fn observe_ignores_monitor_origin_entries() {
        let monitor = monitor();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();

        let mut event = AuditEvent::new(tenant, "security:suspicious_activity", "security")
            .actor(common_audit::AuditActor::user(user));
        event.origin = AuditOrigin::Monitor;
        let entry = AuditLogEntry {
            id: 1,
            recorded_at: Utc::now(),
            event,
        };
        assert!(monitor.observe(&entry).is_empty());
        assert!(monitor.recent_activity(user).is_empty());
    }
}
