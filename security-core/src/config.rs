use anyhow::{anyhow, Context, Result};
use compliance_engine::ComplianceType;
use std::collections::BTreeSet;
use std::env;

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Audit entries older than this are removed by the retention sweep.
    pub retention_days: u32,
    /// Consecutive failed logins per source IP before an ip-blocked signal.
    pub failed_login_block_threshold: u32,
    /// Per-user accesses per trailing hour before a suspicious-activity signal.
    pub anomalous_access_threshold: usize,
    /// Frameworks whose builtin rule sets are registered at startup.
    pub enabled_frameworks: BTreeSet<ComplianceType>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            failed_login_block_threshold: 5,
            anomalous_access_threshold: 50,
            enabled_frameworks: ComplianceType::ALL.into_iter().collect(),
        }
    }
}

pub fn load_security_config() -> Result<SecurityConfig> {
    let defaults = SecurityConfig::default();

    let retention_days = parse_env("SECURITY_RETENTION_DAYS")?.unwrap_or(defaults.retention_days);

    let failed_login_block_threshold = parse_env("SECURITY_FAILED_LOGIN_BLOCK_THRESHOLD")?
        .unwrap_or(defaults.failed_login_block_threshold);

    let anomalous_access_threshold = parse_env("SECURITY_ANOMALOUS_ACCESS_THRESHOLD")?
        .unwrap_or(defaults.anomalous_access_threshold);

    let enabled_frameworks = env::var("SECURITY_ENABLED_FRAMEWORKS")
        .ok()
        .map(|value| parse_frameworks(&value))
        .transpose()
        .context("Failed to parse SECURITY_ENABLED_FRAMEWORKS")?
        .unwrap_or(defaults.enabled_frameworks);

    Ok(SecurityConfig {
        retention_days,
        failed_login_block_threshold,
        anomalous_access_threshold,
        enabled_frameworks,
    })
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Err(_) => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| anyhow!("Invalid {key} '{value}': {err}")),
    }
}

fn parse_frameworks(value: &str) -> Result<BTreeSet<ComplianceType>> {
    let mut frameworks = BTreeSet::new();
    for item in value.split(|c| c == ',' || c == ';' || c == ' ') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let framework = trimmed
            .parse::<ComplianceType>()
            .map_err(|err| anyhow!("{err}"))?;
        frameworks.insert(framework);
    }
    Ok(frameworks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_frameworks() {
        let config = SecurityConfig::default();
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.failed_login_block_threshold, 5);
        assert_eq!(config.anomalous_access_threshold, 50);
        assert_eq!(config.enabled_frameworks.len(), ComplianceType::ALL.len());
    }

    #[test]
    fn parse_frameworks_accepts_csv() {
        let frameworks = parse_frameworks("sox, gdpr").expect("parse");
        assert_eq!(frameworks.len(), 2);
        assert!(frameworks.contains(&ComplianceType::Sox));
        assert!(!frameworks.contains(&ComplianceType::Soc2));
    }

    #[test]
    fn parse_frameworks_rejects_unknown_names() {
        assert!(parse_frameworks("sox,pci").is_err());
    }
}
