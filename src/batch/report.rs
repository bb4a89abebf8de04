//! Batch reports: one outcome per device plus aggregate counts.

use serde::Serialize;

use crate::session::{SessionOutcome, SessionStatus};

/// Aggregate counts over a batch, one bucket per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub success: usize,
    pub precheck_failed: usize,
    pub authentication_failed: usize,
    pub command_timeout: usize,
    pub channel_fault: usize,
    pub cancelled: usize,
}

impl BatchCounts {
    /// Total devices counted.
    pub fn total(&self) -> usize {
        self.success
            + self.precheck_failed
            + self.authentication_failed
            + self.command_timeout
            + self.channel_fault
            + self.cancelled
    }
}

/// The result of one batch run: exactly one [`SessionOutcome`] per input
/// device, in input order. Handed to a reporter collaborator for
/// rendering; the core defines only this in-memory shape.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    outcomes: Vec<SessionOutcome>,
}

impl BatchReport {
    pub(crate) fn new(outcomes: Vec<SessionOutcome>) -> Self {
        Self { outcomes }
    }

    /// All outcomes, in input-device order.
    pub fn outcomes(&self) -> &[SessionOutcome] {
        &self.outcomes
    }

    /// Number of devices covered.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// The outcome for a specific device identity.
    pub fn outcome_for(&self, device: &str) -> Option<&SessionOutcome> {
        self.outcomes.iter().find(|o| o.device == device)
    }

    /// Outcomes that completed successfully.
    pub fn successes(&self) -> impl Iterator<Item = &SessionOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_success())
    }

    /// Outcomes that did not.
    pub fn failures(&self) -> impl Iterator<Item = &SessionOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    /// Aggregate counts by terminal status.
    pub fn counts(&self) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                SessionStatus::Success => counts.success += 1,
                SessionStatus::PrecheckFailed => counts.precheck_failed += 1,
                SessionStatus::AuthenticationFailed => counts.authentication_failed += 1,
                SessionStatus::CommandTimeout => counts.command_timeout += 1,
                SessionStatus::ChannelFault => counts.channel_fault += 1,
                SessionStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counts_bucket_by_status() {
        let report = BatchReport::new(vec![
            SessionOutcome::precheck_failed("10.0.0.1", "unreachable"),
            SessionOutcome::auth_failed("10.0.0.2", Vec::new(), Duration::ZERO),
            SessionOutcome::cancelled("10.0.0.3", "batch cancelled"),
        ]);

        let counts = report.counts();
        assert_eq!(counts.precheck_failed, 1);
        assert_eq!(counts.authentication_failed, 1);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(report.len(), 3);
        assert!(report.successes().next().is_none());
    }

    #[test]
    fn report_serializes_for_reporters() {
        let report = BatchReport::new(vec![SessionOutcome::precheck_failed(
            "10.0.0.1",
            "unreachable",
        )]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["device"], "10.0.0.1");
    }
}
