//! Channel layer: the byte-stream contract the engine drives.
//!
//! Everything above this module works against the [`Channel`] trait, so
//! the same session logic runs over a live SSH shell or a scripted
//! transcript in tests.

mod ansi;
mod buffer;
mod scripted;

pub use ansi::strip_ansi;
pub use buffer::PatternBuffer;
pub use scripted::{ScriptRead, ScriptedChannel};

use async_trait::async_trait;

use crate::error::Result;

/// A byte-oriented duplex channel with non-blocking-poll read semantics.
///
/// The engine requires an already-authenticated interactive channel (an
/// attached shell); establishing it is the transport collaborator's job.
/// Any I/O error is fatal for the session that owns the channel, never
/// for the batch.
#[async_trait]
pub trait Channel: Send {
    /// Read whatever bytes are currently available, up to `max`.
    ///
    /// Returns an empty vector when the remote side is quiet; the caller
    /// decides how long to keep polling.
    async fn read_available(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Write bytes to the remote side.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Release the channel. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
