//! Command execution: one command line in, settled prompt out.
//!
//! The executor owns the race between the device's output pacing and the
//! read loop. It writes a command, then polls the channel at a fixed
//! interval, re-running the prompt detector after every read until a
//! settled prompt of an expected class appears or the deadline passes.
//! Timeout behavior is explicit: one deadline, checked after each settle
//! attempt, never an artifact of accumulated sleeps.

use std::time::Duration;

use log::{debug, trace};
use tokio::time::{Instant, sleep};

use crate::channel::{Channel, PatternBuffer};
use crate::error::{ChannelError, Result};
use crate::prompt::{PromptClass, PromptDetector, PromptMatch};

/// Read size passed to the channel on each poll.
const READ_CHUNK: usize = 65_535;

/// Result of a single command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Command output with the echoed command line and trailing prompt
    /// removed. Empty for commands that produce no output.
    pub output: String,

    /// The full capture, before stripping.
    pub raw: String,

    /// The prompt that ended the wait.
    pub prompt: PromptMatch,

    /// Time from dispatch to settled prompt.
    pub elapsed: Duration,
}

/// Executes commands against a channel with bounded polling.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    poll_interval: Duration,
    search_depth: usize,
}

impl CommandExecutor {
    /// Create an executor with the given poll pacing and prompt search
    /// depth.
    pub fn new(poll_interval: Duration, search_depth: usize) -> Self {
        Self {
            poll_interval,
            search_depth,
        }
    }

    /// Send `command` and wait for a settled prompt in `expected`.
    ///
    /// A command that produces no visible output before the next prompt
    /// yields an empty `output` and is success, not failure.
    pub async fn execute(
        &self,
        channel: &mut dyn Channel,
        detector: &PromptDetector,
        command: &str,
        expected: &[PromptClass],
        timeout: Duration,
    ) -> Result<ExecResult> {
        channel.write(command.as_bytes()).await?;
        channel.write(b"\n").await?;

        let mut result = self
            .read_until_prompt(channel, detector, expected, timeout)
            .await?;
        result.output = strip_echo_and_prompt(&result.raw, command, &result.prompt.line);
        Ok(result)
    }

    /// Poll until a settled prompt in `expected` appears, without sending
    /// anything first. Used for the initial prompt sync after connect.
    ///
    /// The settle check runs before the deadline check, so a prompt read
    /// exactly on the deadline tick still counts as success.
    pub async fn read_until_prompt(
        &self,
        channel: &mut dyn Channel,
        detector: &PromptDetector,
        expected: &[PromptClass],
        timeout: Duration,
    ) -> Result<ExecResult> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut buffer = PatternBuffer::new(self.search_depth);

        loop {
            let chunk = channel.read_available(READ_CHUNK).await?;
            if !chunk.is_empty() {
                trace!("read {} bytes", chunk.len());
                buffer.extend(&chunk);
                if let Some(prompt) = detector.settle(&buffer) {
                    if expected.contains(&prompt.class) {
                        let elapsed = started.elapsed();
                        debug!("prompt settled as {:?} after {:?}", prompt.class, elapsed);
                        let raw = buffer.as_str_lossy().into_owned();
                        return Ok(ExecResult {
                            output: raw.clone(),
                            raw,
                            prompt,
                            elapsed,
                        });
                    }
                    trace!("prompt {:?} settled but not expected, polling on", prompt.class);
                }
            }

            if Instant::now() >= deadline {
                return Err(ChannelError::PromptTimeout {
                    waited: timeout,
                    partial: buffer.as_str_lossy().into_owned(),
                }
                .into());
            }
            sleep(self.poll_interval).await;
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 1000)
    }
}

/// Remove the leading remote echo of the command (exact-prefix match) and
/// the trailing prompt line, leaving only command output.
fn strip_echo_and_prompt(raw: &str, command: &str, prompt_line: &str) -> String {
    let body = raw.strip_prefix(command).unwrap_or(raw);
    let body = body.trim_start_matches(['\r', '\n']);

    match body.rfind('\n') {
        Some(pos) => {
            let (head, tail) = body.split_at(pos);
            if tail[1..].trim() == prompt_line {
                head.trim_end_matches('\r').to_string()
            } else {
                body.trim_end().to_string()
            }
        }
        None => {
            if body.trim() == prompt_line {
                String::new()
            } else {
                body.trim_end().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedChannel;
    use crate::error::Error;

    const POLL: Duration = Duration::from_millis(100);

    fn executor() -> CommandExecutor {
        CommandExecutor::new(POLL, 1000)
    }

    #[tokio::test]
    async fn command_output_is_stripped_of_echo_and_prompt() {
        let script = ScriptedChannel::new();
        script.queue_data(b"show clock\r\n12:00:00.000 UTC Mon Mar 1\r\nswitch01#");
        let mut channel = script.clone();

        let result = executor()
            .execute(
                &mut channel,
                &PromptDetector::ios_default(),
                "show clock",
                &[PromptClass::Privileged],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(result.output, "12:00:00.000 UTC Mon Mar 1");
        assert_eq!(result.prompt.line, "switch01#");
        assert_eq!(script.written_str(), "show clock\n");
    }

    #[tokio::test]
    async fn no_output_command_yields_empty_success() {
        let script = ScriptedChannel::new();
        script.queue_data(b"terminal length 0\r\nswitch01#");
        let mut channel = script.clone();

        let result = executor()
            .execute(
                &mut channel,
                &PromptDetector::ios_default(),
                "terminal length 0",
                &[PromptClass::Privileged],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(result.output, "");
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_on_the_deadline_tick_is_success() {
        // Two quiet polls, then the prompt arrives on the read at
        // t = 2 * POLL, exactly when the deadline falls.
        let script = ScriptedChannel::new();
        script.queue_quiet(2);
        script.queue_data(b"switch01#");
        let mut channel = script.clone();

        let result = executor()
            .read_until_prompt(
                &mut channel,
                &PromptDetector::ios_default(),
                &[PromptClass::Privileged],
                2 * POLL,
            )
            .await
            .unwrap();

        assert_eq!(result.prompt.class, PromptClass::Privileged);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_one_poll_past_the_deadline_is_timeout() {
        // The read at the deadline tick is still quiet; the prompt would
        // only arrive one poll later.
        let script = ScriptedChannel::new();
        script.queue_quiet(3);
        script.queue_data(b"switch01#");
        let mut channel = script.clone();

        let err = executor()
            .read_until_prompt(
                &mut channel,
                &PromptDetector::ios_default(),
                &[PromptClass::Privileged],
                2 * POLL,
            )
            .await
            .unwrap_err();

        match err {
            Error::Channel(ChannelError::PromptTimeout { waited, .. }) => {
                assert_eq!(waited, 2 * POLL);
            }
            other => panic!("expected PromptTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_preserves_partial_output() {
        let script = ScriptedChannel::new();
        script.queue_data(b"show version\r\nCisco IOS Software, partial banner");
        let mut channel = script.clone();

        let err = executor()
            .execute(
                &mut channel,
                &PromptDetector::ios_default(),
                "show version",
                &[PromptClass::Privileged],
                3 * POLL,
            )
            .await
            .unwrap_err();

        match err {
            Error::Channel(ChannelError::PromptTimeout { partial, .. }) => {
                assert!(partial.contains("partial banner"));
            }
            other => panic!("expected PromptTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_prompt_class_keeps_polling() {
        // A user prompt settles, but the caller insists on privileged;
        // the loop keeps going until the privileged prompt shows up.
        let script = ScriptedChannel::new();
        script.queue_data(b"switch01>");
        script.queue_quiet(1);
        script.queue_data(b"\r\nswitch01#");
        let mut channel = script.clone();

        let result = executor()
            .read_until_prompt(
                &mut channel,
                &PromptDetector::ios_default(),
                &[PromptClass::Privileged],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(result.prompt.class, PromptClass::Privileged);
    }
}
