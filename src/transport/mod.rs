//! SSH transport layer wrapping russh.
//!
//! The engine core only needs the [`Channel`](crate::channel::Channel)
//! contract; this module provides the production implementation of it
//! plus the [`Connector`](crate::batch::Connector) the batch
//! orchestrator uses to open one.

pub mod config;
mod ssh;

pub use config::{AuthMethod, SshConfig};
pub use ssh::{SshChannel, SshConnector, SshTransport};
