//! Session lifecycle: one device, one channel, one plan.
//!
//! The runner walks a fixed state machine (prompt sync, optional
//! privilege escalation, setup, the plan, best-effort draining) and
//! always produces exactly one [`SessionOutcome`], preserving the
//! partial transcript and fact table on every failure path.

mod facts;
mod outcome;
mod plan;

pub use facts::SessionFacts;
pub use outcome::{AuthAttempt, CommandRecord, SessionOutcome, SessionStatus};
pub use plan::{CommandPlan, CommandTemplate, PlanStep, StepCommand};

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::{Instant, timeout};

use crate::batch::CancelHandle;
use crate::channel::Channel;
use crate::error::{ChannelError, Error, Result, SessionError, TransportError};
use crate::executor::CommandExecutor;
use crate::prompt::{PromptClass, PromptDetector};

/// Prompt classes a command may legitimately end at once the session is
/// in steady state.
const READY_PROMPTS: &[PromptClass] = &[PromptClass::User, PromptClass::Privileged];

/// Runtime parameters for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Budget for each command's settle wait.
    pub command_timeout: Duration,

    /// Budget for the whole session, connect to close.
    pub session_timeout: Duration,

    /// Pacing of the executor's poll loop.
    pub poll_interval: Duration,

    /// Prompt search depth in bytes.
    pub search_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            session_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(100),
            search_depth: 1000,
        }
    }
}

/// Lifecycle states. `Error` is reachable from every non-closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    PromptSync,
    PrivilegeEscalation,
    Ready,
    Executing,
    Draining,
    Closed,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::PromptSync => "prompt-sync",
            Self::PrivilegeEscalation => "privilege-escalation",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Draining => "draining",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Drives one session over an already-connected channel.
///
/// The channel's lifetime is exactly the session's lifetime: it is
/// released on every exit path, including timeout and cancellation.
pub struct SessionRunner {
    channel: Box<dyn Channel>,
    detector: PromptDetector,
    executor: CommandExecutor,
    config: SessionConfig,
    device: String,
    enable_secret: Option<SecretString>,
    cancel: Option<CancelHandle>,
    state: SessionState,
    facts: SessionFacts,
    transcript: Vec<CommandRecord>,
}

impl SessionRunner {
    /// Create a runner for an already-connected channel.
    pub fn new(
        channel: Box<dyn Channel>,
        detector: PromptDetector,
        config: SessionConfig,
        device: impl Into<String>,
    ) -> Self {
        let executor = CommandExecutor::new(config.poll_interval, config.search_depth);
        Self {
            channel,
            detector,
            executor,
            config,
            device: device.into(),
            enable_secret: None,
            cancel: None,
            state: SessionState::Connecting,
            facts: SessionFacts::new(),
            transcript: Vec::new(),
        }
    }

    /// Provide the privilege escalation secret.
    pub fn with_enable_secret(mut self, secret: Option<SecretString>) -> Self {
        self.enable_secret = secret;
        self
    }

    /// Attach a cancellation handle checked between plan steps.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the plan to completion and produce the session's outcome.
    ///
    /// Never returns an error: every failure is classified into the
    /// outcome's status, with the partial transcript and fact table
    /// preserved.
    pub async fn run(mut self, plan: &CommandPlan) -> SessionOutcome {
        let started = Instant::now();
        // Seed the identity fact so templates can reference the device.
        self.facts.insert("host", self.device.clone());

        let (status, error) =
            match timeout(self.config.session_timeout, self.drive(plan)).await {
                Ok(Ok(())) => (SessionStatus::Success, None),
                Ok(Err(err)) => {
                    let status = classify(&err);
                    warn!("[{}] session failed in {}: {err}", self.device, self.state);
                    (status, Some(err.to_string()))
                }
                Err(_) => {
                    warn!(
                        "[{}] session deadline of {:?} exceeded in {}",
                        self.device, self.config.session_timeout, self.state
                    );
                    (
                        SessionStatus::CommandTimeout,
                        Some(format!(
                            "session deadline of {:?} exceeded",
                            self.config.session_timeout
                        )),
                    )
                }
            };

        self.state = if status.is_success() {
            SessionState::Closed
        } else {
            SessionState::Error
        };
        if let Err(err) = self.channel.close().await {
            debug!("[{}] channel close failed: {err}", self.device);
        }
        info!("[{}] session finished: {status}", self.device);

        SessionOutcome {
            device: self.device,
            status,
            facts: self.facts,
            transcript: self.transcript,
            auth_attempts: Vec::new(),
            error,
            elapsed: started.elapsed(),
        }
    }

    /// The state machine proper. Errors bubble out for classification.
    async fn drive(&mut self, plan: &CommandPlan) -> Result<()> {
        self.transition(SessionState::PromptSync);
        let sync = self
            .executor
            .read_until_prompt(
                self.channel.as_mut(),
                &self.detector,
                READY_PROMPTS,
                self.config.command_timeout,
            )
            .await?;
        debug!(
            "[{}] initial prompt {:?} ({:?})",
            self.device, sync.prompt.line, sync.prompt.class
        );

        if plan.requires_privileged() && sync.prompt.class == PromptClass::User {
            self.transition(SessionState::PrivilegeEscalation);
            self.escalate(plan).await?;
        }

        self.transition(SessionState::Ready);
        for command in plan.setup_commands() {
            self.check_cancelled()?;
            self.run_command(command.clone(), None).await?;
        }

        self.transition(SessionState::Executing);
        for step in plan.steps() {
            self.check_cancelled()?;
            let Some(command) = step.resolve(&self.facts)? else {
                debug!("[{}] step '{}' skipped", self.device, step.label());
                continue;
            };
            let output = self.run_command(command, step.timeout()).await?;
            for rule in step.rules() {
                if let Some(value) = rule.extract(&output) {
                    if let Some(previous) = self.facts.insert(rule.fact(), value.clone()) {
                        debug!(
                            "[{}] fact '{}' superseded: '{}' -> '{}'",
                            self.device,
                            rule.fact(),
                            previous,
                            value
                        );
                    } else {
                        debug!("[{}] fact '{}' = '{}'", self.device, rule.fact(), value);
                    }
                }
            }
        }

        self.transition(SessionState::Draining);
        for command in plan.teardown_commands() {
            // Teardown is best-effort: a failure here degrades only the
            // transcript, never the outcome.
            if let Err(err) = self.run_command(command.clone(), None).await {
                warn!("[{}] teardown command failed: {err}", self.device);
                break;
            }
        }

        Ok(())
    }

    /// Escalate to a privileged prompt, answering the password challenge
    /// if the device issues one.
    async fn escalate(&mut self, plan: &CommandPlan) -> Result<()> {
        let escalate_command = plan.escalate_command().to_string();
        debug!("[{}] escalating with '{}'", self.device, escalate_command);

        let result = self
            .executor
            .execute(
                self.channel.as_mut(),
                &self.detector,
                &escalate_command,
                &[PromptClass::Password, PromptClass::Privileged],
                self.config.command_timeout,
            )
            .await
            .map_err(auth_class)?;
        self.transcript.push(CommandRecord::ok(
            escalate_command.as_str(),
            result.output.clone(),
            result.elapsed,
        ));

        if result.prompt.class == PromptClass::Privileged {
            return Ok(());
        }

        // Password challenge. The secret is written but never recorded.
        let Some(secret) = self.enable_secret.clone() else {
            return Err(SessionError::EscalationFailed {
                detail: "device asked for an escalation secret but none was provided".into(),
            }
            .into());
        };
        self.executor
            .execute(
                self.channel.as_mut(),
                &self.detector,
                secret.expose_secret(),
                &[PromptClass::Privileged],
                self.config.command_timeout,
            )
            .await
            .map_err(auth_class)?;
        debug!("[{}] privileged prompt acquired", self.device);
        Ok(())
    }

    /// Execute one command, recording it in the transcript whatever
    /// happens.
    async fn run_command(
        &mut self,
        command: String,
        timeout_override: Option<Duration>,
    ) -> Result<String> {
        let budget = timeout_override.unwrap_or(self.config.command_timeout);
        debug!("[{}] sending '{}'", self.device, command);

        match self
            .executor
            .execute(
                self.channel.as_mut(),
                &self.detector,
                &command,
                READY_PROMPTS,
                budget,
            )
            .await
        {
            Ok(result) => {
                self.transcript.push(CommandRecord::ok(
                    command,
                    result.output.clone(),
                    result.elapsed,
                ));
                Ok(result.output)
            }
            Err(err) => {
                // Preserve whatever arrived for diagnostics.
                let (partial, elapsed) = match &err {
                    Error::Channel(ChannelError::PromptTimeout { partial, waited }) => {
                        (partial.clone(), *waited)
                    }
                    _ => (String::new(), Duration::ZERO),
                };
                self.transcript
                    .push(CommandRecord::failed(command, partial, elapsed));
                Err(err)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelHandle::is_cancelled) {
            return Err(SessionError::Cancelled.into());
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        debug!("[{}] {} -> {next}", self.device, self.state);
        self.state = next;
    }
}

/// Map an escalation-phase error into the authentication class: a prompt
/// that never settles after `enable` means the secret (or the privilege)
/// was rejected, not that the channel is slow.
fn auth_class(err: Error) -> Error {
    match err {
        Error::Channel(ChannelError::PromptTimeout { .. }) => SessionError::EscalationFailed {
            detail: "no privileged prompt after escalation".into(),
        }
        .into(),
        other => other,
    }
}

/// Classify a session error into the closed status taxonomy.
fn classify(err: &Error) -> SessionStatus {
    match err {
        Error::Channel(ChannelError::PromptTimeout { .. }) => SessionStatus::CommandTimeout,
        Error::Channel(_) => SessionStatus::ChannelFault,
        Error::Session(SessionError::EscalationFailed { .. }) => {
            SessionStatus::AuthenticationFailed
        }
        Error::Session(SessionError::Cancelled) => SessionStatus::Cancelled,
        Error::Transport(TransportError::AuthenticationFailed { .. }) => {
            SessionStatus::AuthenticationFailed
        }
        _ => SessionStatus::ChannelFault,
    }
}
