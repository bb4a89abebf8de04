//! # Shoal
//!
//! Async batch automation engine for interactive network device CLI
//! sessions.
//!
//! Shoal drives text-oriented command-line interfaces over
//! character-streaming channels (interactive SSH shells) that offer no
//! framing, no sequence numbers, and no "done" signal. It detects when a
//! device's output has settled at a prompt, classifies the prompt's
//! privilege, paces commands, captures and demarcates each command's
//! output, substitutes discovered facts into later commands, and runs
//! the whole thing across a device inventory with credential fallback
//! and bounded concurrency.
//!
//! ## Features
//!
//! - Prompt settling over raw byte streams, with ordered shape rules
//! - Explicit poll-with-deadline timeouts, testable to the boundary tick
//! - Declarative plans: setup, templated/conditional/derived steps,
//!   extraction rules with fallback refinement, best-effort teardown
//! - Per-device credential fallback with a closed failure taxonomy
//! - Bounded concurrency, cancellation with a wind-down grace period
//! - A scripted channel for driving whole sessions in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shoal::{
//!     BatchRunner, CommandPlan, Credential, DeviceDescriptor, ExtractRule, PlanStep,
//!     SshConnector, cancel_pair,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shoal::Error> {
//!     let device = DeviceDescriptor::new("192.0.2.10")
//!         .with_credential(Credential::new("admin", "secret"))
//!         .with_enable_secret("enable-secret");
//!
//!     let plan = CommandPlan::new()
//!         .privileged()
//!         .with_setup_command("terminal length 0")
//!         .with_step(
//!             PlanStep::run("show version")
//!                 .with_rule(ExtractRule::new("ios_version", r"Version ([^,\s]+)")?),
//!         )
//!         .with_teardown_command("terminal no length");
//!
//!     let runner = BatchRunner::new(Arc::new(SshConnector::new()));
//!     let (_cancel, handle) = cancel_pair();
//!     let report = runner.run(vec![device], Arc::new(plan), handle).await;
//!
//!     println!("{} of {} succeeded", report.counts().success, report.len());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod channel;
pub mod device;
pub mod error;
pub mod executor;
pub mod extract;
pub mod prompt;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use batch::{
    BatchConfig, BatchCounts, BatchReport, BatchRunner, CancelHandle, CancelSource, Connector,
    Precheck, TcpPrecheck, cancel_pair,
};
pub use channel::{Channel, PatternBuffer, ScriptedChannel};
pub use device::{Credential, DeviceDescriptor};
pub use error::Error;
pub use executor::{CommandExecutor, ExecResult};
pub use extract::{ExtractRule, Normalize};
pub use prompt::{PromptClass, PromptDetector, PromptMatch, PromptRule};
pub use session::{
    CommandPlan, CommandRecord, CommandTemplate, PlanStep, SessionConfig, SessionFacts,
    SessionOutcome, SessionRunner, SessionStatus,
};
pub use transport::{AuthMethod, SshConfig, SshConnector};
