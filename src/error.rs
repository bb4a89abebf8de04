//! Error types for shoal.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for shoal operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Plan construction/registration errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (reads, writes, prompt settling).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// No settled prompt within the command's timeout budget.
    ///
    /// `partial` carries everything read before the deadline so the
    /// session can preserve it in the transcript.
    #[error("No settled prompt within {waited:?}")]
    PromptTimeout { waited: Duration, partial: String },

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A template placeholder has no value in the fact table
    #[error("Fact '{name}' required by template '{template}' is not in the fact table")]
    MissingFact { name: String, template: String },

    /// Privilege escalation did not reach a privileged prompt
    #[error("Privilege escalation failed: {detail}")]
    EscalationFailed { detail: String },

    /// The session was cancelled by the batch orchestrator
    #[error("Session cancelled")]
    Cancelled,
}

/// Plan registration errors, surfaced when a plan is built rather than
/// when it runs.
#[derive(Error, Debug)]
pub enum PlanError {
    /// Invalid regex in an extraction or prompt rule
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Malformed command template (unbalanced or empty placeholder)
    #[error("Invalid template: {message}")]
    InvalidTemplate { message: String },

    /// Plan-level consistency failure
    #[error("Invalid plan: {message}")]
    InvalidPlan { message: String },
}

/// Result type alias using shoal's Error.
pub type Result<T> = std::result::Result<T, Error>;
