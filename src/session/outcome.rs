//! Session outcomes: transcript records, terminal statuses, per-device
//! results.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::facts::SessionFacts;

/// One executed command and what came back.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    /// The resolved command text that was sent.
    pub command: String,

    /// Captured output (partial on failure, preserved for diagnostics).
    pub output: String,

    /// Time from dispatch to settled prompt (or to failure).
    pub elapsed: Duration,

    /// Whether the command reached a settled prompt.
    pub success: bool,
}

impl CommandRecord {
    /// Record a successful command.
    pub fn ok(command: impl Into<String>, output: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            elapsed,
            success: true,
        }
    }

    /// Record a failed command, keeping whatever output arrived.
    pub fn failed(
        command: impl Into<String>,
        partial_output: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            output: partial_output.into(),
            elapsed,
            success: false,
        }
    }
}

/// Terminal classification of a device attempt. Exactly one per
/// [`SessionOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    /// The plan completed through draining and the channel was released.
    /// Best-effort teardown failures do not downgrade this.
    Success,

    /// The device failed its reachability pre-check; no session was
    /// attempted.
    PrecheckFailed,

    /// Connection or privilege escalation was rejected for every
    /// candidate credential.
    AuthenticationFailed,

    /// An expected prompt never settled within budget. Fatal to the
    /// session and never retried with another credential.
    CommandTimeout,

    /// The underlying transport failed mid-session.
    ChannelFault,

    /// The batch was cancelled before or during this device's session.
    Cancelled,
}

impl SessionStatus {
    /// Whether this status is the success terminal.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::PrecheckFailed => "precheck-failed",
            Self::AuthenticationFailed => "authentication-failed",
            Self::CommandTimeout => "command-timeout",
            Self::ChannelFault => "channel-fault",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A rejected credential attempt, kept for logging and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAttempt {
    /// Username of the rejected credential.
    pub username: String,

    /// Human-readable rejection detail.
    pub detail: String,
}

/// Everything that came out of one device attempt. Produced exactly once
/// per device; owned by the batch report afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Device identity (hostname or IP).
    pub device: String,

    /// Terminal status.
    pub status: SessionStatus,

    /// Fact table snapshot, possibly partial on failure.
    pub facts: SessionFacts,

    /// Ordered transcript of executed commands, possibly partial.
    pub transcript: Vec<CommandRecord>,

    /// Credential attempts rejected before the final outcome.
    pub auth_attempts: Vec<AuthAttempt>,

    /// Error detail when the status is not success.
    pub error: Option<String>,

    /// Wall time spent on this device.
    pub elapsed: Duration,
}

impl SessionOutcome {
    /// An outcome for a device that failed its pre-check.
    pub fn precheck_failed(device: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: SessionStatus::PrecheckFailed,
            facts: SessionFacts::new(),
            transcript: Vec::new(),
            auth_attempts: Vec::new(),
            error: Some(detail.into()),
            elapsed: Duration::ZERO,
        }
    }

    /// An outcome for a device whose credential list was exhausted.
    pub fn auth_failed(
        device: impl Into<String>,
        auth_attempts: Vec<AuthAttempt>,
        elapsed: Duration,
    ) -> Self {
        let error = if auth_attempts.is_empty() {
            "no credentials supplied".to_string()
        } else {
            format!("all {} credentials rejected", auth_attempts.len())
        };
        Self {
            device: device.into(),
            status: SessionStatus::AuthenticationFailed,
            facts: SessionFacts::new(),
            transcript: Vec::new(),
            auth_attempts,
            error: Some(error),
            elapsed,
        }
    }

    /// An outcome for a device whose connection faulted outside a
    /// session.
    pub fn fault(
        device: impl Into<String>,
        auth_attempts: Vec<AuthAttempt>,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            device: device.into(),
            status: SessionStatus::ChannelFault,
            facts: SessionFacts::new(),
            transcript: Vec::new(),
            auth_attempts,
            error: Some(detail.into()),
            elapsed,
        }
    }

    /// An outcome for a device the batch never (fully) attempted because
    /// of cancellation.
    pub fn cancelled(device: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: SessionStatus::Cancelled,
            facts: SessionFacts::new(),
            transcript: Vec::new(),
            auth_attempts: Vec::new(),
            error: Some(detail.into()),
            elapsed: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failed_summarizes_attempts() {
        let outcome = SessionOutcome::auth_failed(
            "10.0.0.1",
            vec![
                AuthAttempt {
                    username: "admin".into(),
                    detail: "rejected".into(),
                },
                AuthAttempt {
                    username: "backup".into(),
                    detail: "rejected".into(),
                },
            ],
            Duration::from_secs(2),
        );
        assert_eq!(outcome.status, SessionStatus::AuthenticationFailed);
        assert_eq!(outcome.auth_attempts.len(), 2);
        assert_eq!(outcome.error.as_deref(), Some("all 2 credentials rejected"));
    }

    #[test]
    fn status_display_is_kebab_case() {
        assert_eq!(SessionStatus::CommandTimeout.to_string(), "command-timeout");
        assert_eq!(SessionStatus::Success.to_string(), "success");
    }

    #[test]
    fn outcomes_serialize_for_reporters() {
        let outcome = SessionOutcome::precheck_failed("10.0.0.9", "tcp connect refused");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"PrecheckFailed\""));
        assert!(json.contains("10.0.0.9"));
    }
}
