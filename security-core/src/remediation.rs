use anyhow::Result;
use compliance_engine::RemediationCommand;
use std::sync::Mutex;

/// Executes a corrective action for a critical violation. Implementations
/// must be CPU-bound and quick; anything touching the network belongs in the
/// embedding application behind its own queue.
pub trait Remediator: Send + Sync {
    /// Returns a short description of the action taken.
    fn remediate(&self, command: &RemediationCommand) -> Result<String>;
}

/// Default remediator: parks the violation on an operator review queue. The
/// platform's alerting layer polls `pending` and owns the real-world follow-up.
#[derive(Default)]
pub struct ReviewQueueRemediator {
    queue: Mutex<Vec<RemediationCommand>>,
}

impl ReviewQueueRemediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<RemediationCommand> {
        self.queue.lock().expect("review queue lock").clone()
    }
}

impl Remediator for ReviewQueueRemediator {
    fn remediate(&self, command: &RemediationCommand) -> Result<String> {
        self.queue
            .lock()
            .expect("review queue lock")
            .push(command.clone());
        Ok(format!(
            "queued violation {} for operator review",
            command.violation_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_engine::{ComplianceType, Severity};
    use uuid::Uuid;

    #[test]
    fn review_queue_retains_commands() {
        let remediator = ReviewQueueRemediator::new();
        let command = RemediationCommand {
            violation_id: Uuid::new_v4(),
            rule_id: "sox-financial-record-deletion".to_string(),
            compliance_type: ComplianceType::Sox,
            severity: Severity::Critical,
            tenant_id: Uuid::new_v4(),
            audit_entry_id: 3,
        };
        remediator.remediate(&command).expect("remediate");
        let pending = remediator.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].violation_id, command.violation_id);
    }
}
